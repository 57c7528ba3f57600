//! Request line and header formatting
//!
//! Every builder computes the exact line length before touching the buffer.
//! A line that does not fit yields [`ProtocolError::BufferTooSmall`] and the
//! buffer is left as it was; a line that fits is written at the front and
//! the rest of the buffer is zeroed.

use core::fmt::{self, Write};

use super::{CRLF, PROTOCOL};
use crate::buffer::ScratchBuf;
use crate::error::{ProtocolError, ProtocolResult};
use crate::io::ByteSink;

/// Request methods used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts formatted bytes without storing them
struct Counter(usize);

impl fmt::Write for Counter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

/// Exact byte length of formatted output
pub fn formatted_len(args: fmt::Arguments<'_>) -> usize {
    let mut counter = Counter(0);
    // Counter never fails; a failing Display impl just yields a short count
    let _ = counter.write_fmt(args);
    counter.0
}

/// Writes into a slice, refusing to overflow
struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.pos + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.pos..end].copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}

/// Measure, check, then format `args` at the front of `buf`
fn write_checked(buf: &mut [u8], args: fmt::Arguments<'_>) -> ProtocolResult<usize> {
    let needed = formatted_len(args);
    let have = buf.len();
    if needed > have {
        return Err(ProtocolError::BufferTooSmall { needed, have });
    }

    let mut writer = SliceWriter { buf, pos: 0 };
    if writer.write_fmt(args).is_err() {
        writer.buf.fill(0);
        return Err(ProtocolError::BufferTooSmall { needed, have });
    }
    let written = writer.pos;
    writer.buf[written..].fill(0);
    Ok(written)
}

/// Format `METHOD SP resource SP HTTP/1.1 CRLF`
pub fn request_line(buf: &mut [u8], method: Method, resource: &str) -> ProtocolResult<usize> {
    write_checked(
        buf,
        format_args!("{} {} {}{}", method.as_str(), resource, PROTOCOL, CRLF),
    )
}

/// Format `key: value CRLF`
pub fn header_line(buf: &mut [u8], key: &str, value: &str) -> ProtocolResult<usize> {
    header_line_fmt(buf, key, format_args!("{}", value))
}

/// Format `key: <formatted value> CRLF`, for numeric or templated values
pub fn header_line_fmt(
    buf: &mut [u8],
    key: &str,
    value: fmt::Arguments<'_>,
) -> ProtocolResult<usize> {
    write_checked(buf, format_args!("{}: {}{}", key, value, CRLF))
}

/// Format the bare CRLF that ends the header block
pub fn end_headers(buf: &mut [u8]) -> ProtocolResult<usize> {
    write_checked(buf, format_args!("{}", CRLF))
}

/// Streams a request to a sink one line at a time through a scratch buffer.
///
/// Each line is built in `scratch` and handed to the sink before the next
/// one is formatted, so the whole request never has to fit at once.
pub struct RequestWriter<'a, S: ByteSink + ?Sized, const N: usize> {
    sink: &'a mut S,
    scratch: &'a mut ScratchBuf<N>,
    sent: usize,
}

impl<'a, S: ByteSink + ?Sized, const N: usize> RequestWriter<'a, S, N> {
    pub fn new(sink: &'a mut S, scratch: &'a mut ScratchBuf<N>) -> Self {
        Self {
            sink,
            scratch,
            sent: 0,
        }
    }

    /// Total bytes handed to the sink so far
    pub fn bytes_sent(&self) -> usize {
        self.sent
    }

    fn emit(
        &mut self,
        build: impl FnOnce(&mut [u8]) -> ProtocolResult<usize>,
    ) -> ProtocolResult<()> {
        self.scratch.clear();
        let n = build(self.scratch.spare_mut())?;
        self.scratch.commit(n);
        trace!(
            "> {}",
            core::str::from_utf8(self.scratch.as_slice())
                .unwrap_or("<binary>")
                .trim_end()
        );
        self.sink.write_all(self.scratch.as_slice())?;
        self.sent += n;
        Ok(())
    }

    pub fn start(&mut self, method: Method, resource: &str) -> ProtocolResult<()> {
        self.emit(|buf| request_line(buf, method, resource))
    }

    pub fn header(&mut self, key: &str, value: &str) -> ProtocolResult<()> {
        self.emit(|buf| header_line(buf, key, value))
    }

    pub fn header_fmt(&mut self, key: &str, value: fmt::Arguments<'_>) -> ProtocolResult<()> {
        self.emit(|buf| header_line_fmt(buf, key, value))
    }

    pub fn end_headers(&mut self) -> ProtocolResult<()> {
        self.emit(end_headers)
    }

    /// Format a body of exactly `len` bytes (as announced in the
    /// `Content-Length` header) and send it
    pub fn body_fmt(&mut self, body: fmt::Arguments<'_>, len: usize) -> ProtocolResult<()> {
        if len == 0 {
            return Ok(());
        }
        self.emit(|buf| {
            let n = write_checked(buf, body)?;
            if n != len {
                // Display output changed between measuring and writing
                return Err(ProtocolError::ParseError("body length changed while formatting"));
            }
            Ok(n)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_line() {
        let mut buf = [0xAAu8; 64];
        let n = request_line(&mut buf, Method::Post, "/v1/devices").unwrap();
        assert_eq!(&buf[..n], b"POST /v1/devices HTTP/1.1\r\n");
        assert!(buf[n..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_request_line_exact_fit() {
        let line = b"GET /t HTTP/1.1\r\n";
        let mut buf = [0u8; 17];
        assert_eq!(line.len(), 17);
        assert_eq!(request_line(&mut buf, Method::Get, "/t"), Ok(17));
        assert_eq!(&buf, line);
    }

    #[test]
    fn test_request_line_too_small_writes_nothing() {
        let mut buf = [0xAAu8; 16];
        let err = request_line(&mut buf, Method::Get, "/t").unwrap_err();
        assert_eq!(err, ProtocolError::BufferTooSmall { needed: 17, have: 16 });
        assert!(buf.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_header_lines() {
        let mut buf = [0u8; 64];
        let n = header_line(&mut buf, "Host", "api.iobeam.com").unwrap();
        assert_eq!(&buf[..n], b"Host: api.iobeam.com\r\n");

        let n = header_line_fmt(&mut buf, "Content-Length", format_args!("{}", 17)).unwrap();
        assert_eq!(&buf[..n], b"Content-Length: 17\r\n");

        let n = header_line_fmt(&mut buf, "Authorization", format_args!("Bearer {}", "tok"))
            .unwrap();
        assert_eq!(&buf[..n], b"Authorization: Bearer tok\r\n");

        let n = end_headers(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"\r\n");
        assert!(buf[n..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_formatted_len() {
        assert_eq!(formatted_len(format_args!("{{\"project_id\":{}}}", 42)), 17);
        assert_eq!(formatted_len(format_args!("")), 0);
    }
}
