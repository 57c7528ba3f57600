//! Single-line response parsing
//!
//! Both parsers take one line that the assembler has already isolated (no
//! CRLF) and never panic on malformed input.

use crate::scan::{parse_uint, skip_ws};

const CONTENT_LENGTH: &[u8] = b"content-length";

/// Status code from `"<protocol> <code> <reason>"`.
///
/// The code is the integer following the first space. Returns `None` when
/// the line has no space or no number there; callers treat that as a
/// protocol violation.
pub fn parse_status_code(line: &[u8]) -> Option<u16> {
    let space = line.iter().position(|&b| b == b' ')?;
    parse_uint(&line[space..])
}

/// Value of a `content-length` header, if this line carries one.
///
/// The name must start the line (ASCII case-insensitive) and be followed by
/// `:`; whitespace around the value is allowed. A `None` means "not this
/// line"; keep scanning until the header block ends.
pub fn parse_content_length(line: &[u8]) -> Option<usize> {
    if line.len() <= CONTENT_LENGTH.len() {
        return None;
    }
    let (name, rest) = line.split_at(CONTENT_LENGTH.len());
    if !name.eq_ignore_ascii_case(CONTENT_LENGTH) {
        return None;
    }
    let value = skip_ws(rest).strip_prefix(b":")?;
    parse_uint(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code() {
        assert_eq!(parse_status_code(b"HTTP/1.1 200 OK"), Some(200));
        assert_eq!(parse_status_code(b"HTTP/1.1 201 Created"), Some(201));
        assert_eq!(parse_status_code(b"HTTP/1.0 404"), Some(404));
    }

    #[test]
    fn test_status_code_malformed() {
        assert_eq!(parse_status_code(b"HTTP/1.1"), None);
        assert_eq!(parse_status_code(b"HTTP/1.1 OK"), None);
        assert_eq!(parse_status_code(b""), None);
    }

    #[test]
    fn test_content_length() {
        assert_eq!(parse_content_length(b"Content-Length: 5"), Some(5));
        assert_eq!(parse_content_length(b"content-length: 1234"), Some(1234));
        assert_eq!(parse_content_length(b"Content-Type: application/json"), None);
        assert_eq!(parse_content_length(b"CONTENT-LENGTH:5"), Some(5));
        assert_eq!(parse_content_length(b"Content-Length: -3"), None);
        assert_eq!(parse_content_length(b"Content-Length"), None);
    }

    #[test]
    fn test_content_length_name_must_start_line() {
        assert_eq!(parse_content_length(b"X-Original-Content-Length: 2"), None);
        assert_eq!(parse_content_length(b" Content-Length: 2"), None);
        assert_eq!(parse_content_length(b"Content-Lengthy: 2"), None);
    }
}
