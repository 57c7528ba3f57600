//! JSON payloads and field extraction
//!
//! Request bodies are `Display` types so they can be measured for
//! `Content-Length` and then streamed without ever existing as a string.
//! Response fields are located by key and sliced straight out of the body.

use core::fmt::{self, Write};

use crate::scan::{find, parse_uint, skip_ws};
use crate::time::Timeval;
use crate::value::Value;

/// A string written as a quoted, escaped JSON string literal
#[derive(Debug, Clone, Copy)]
pub struct JsonStr<'a>(pub &'a str);

impl fmt::Display for JsonStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        let mut run = 0;
        for (i, c) in self.0.char_indices() {
            let escape: Option<&str> = match c {
                '"' => Some("\\\""),
                '\\' => Some("\\\\"),
                '\n' => Some("\\n"),
                '\r' => Some("\\r"),
                '\t' => Some("\\t"),
                c if (c as u32) < 0x20 => None,
                _ => continue,
            };
            f.write_str(&self.0[run..i])?;
            match escape {
                Some(s) => f.write_str(s)?,
                None => write!(f, "\\u{:04x}", c as u32)?,
            }
            run = i + c.len_utf8();
        }
        f.write_str(&self.0[run..])?;
        f.write_char('"')
    }
}

/// Body of `POST /v1/devices`
#[derive(Debug, Clone, Copy)]
pub struct RegisterPayload {
    pub project_id: u32,
}

impl fmt::Display for RegisterPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{\"project_id\":{}}}", self.project_id)
    }
}

/// Body of `POST /v1/imports` carrying one data point
#[derive(Debug, Clone, Copy)]
pub struct ImportPayload<'a> {
    pub device_id: &'a str,
    pub project_id: u32,
    pub key: &'a str,
    pub time: Timeval,
    pub value: Value,
}

impl fmt::Display for ImportPayload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\"device_id\":{},\"project_id\":{},\"sources\":[{{\"name\":{},\"data\":[{{\"time\":{},\"value\":{}}}]}}]}}",
            JsonStr(self.device_id),
            self.project_id,
            JsonStr(self.key),
            self.time,
            self.value,
        )
    }
}

/// Bytes following `"key":`, with surrounding whitespace skipped
pub fn field<'a>(body: &'a [u8], key: &str) -> Option<&'a [u8]> {
    let key = key.as_bytes();
    let mut from = 0;
    while let Some(at) = find(&body[from..], key) {
        let start = from + at;
        let end = start + key.len();
        from = start + 1;

        let quoted = start > 0 && body[start - 1] == b'"' && body.get(end) == Some(&b'"');
        if !quoted {
            continue;
        }
        if let Some(value) = skip_ws(&body[end + 1..]).strip_prefix(b":") {
            return Some(skip_ws(value));
        }
    }
    None
}

/// Non-negative integer value of `key`
pub fn uint_field<T: TryFrom<i64>>(body: &[u8], key: &str) -> Option<T> {
    let value = field(body, key)?;
    if !value.first().is_some_and(u8::is_ascii_digit) {
        return None;
    }
    parse_uint(value)
}

/// Raw contents of the string value of `key`, without the quotes
pub fn str_field<'a>(body: &'a [u8], key: &str) -> Option<&'a [u8]> {
    let value = field(body, key)?.strip_prefix(b"\"")?;
    let end = value.iter().position(|&b| b == b'"')?;
    Some(&value[..end])
}
