//! Byte scanning helpers shared by the HTTP line parser and the JSON field
//! extractors. All of them work on borrowed slices and never allocate.

/// Position of the first occurrence of `needle` in `haystack`
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position of the first `\r\n` in `bytes`
pub(crate) fn find_crlf(bytes: &[u8]) -> Option<usize> {
    find(bytes, b"\r\n")
}

/// Drop leading ASCII whitespace
pub(crate) fn skip_ws(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Parse a leading decimal integer: optional whitespace, optional sign, then
/// digits. Anything after the digits is ignored. Returns `None` when no digit
/// is present or the value overflows `i64`.
pub(crate) fn parse_int(bytes: &[u8]) -> Option<i64> {
    let bytes = skip_ws(bytes);
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };

    let mut value: i64 = 0;
    let mut seen = 0;
    for &b in digits.iter().take_while(|b| b.is_ascii_digit()) {
        let digit = (b - b'0') as i64;
        value = value.checked_mul(10)?;
        value = if negative {
            value.checked_sub(digit)?
        } else {
            value.checked_add(digit)?
        };
        seen += 1;
    }

    (seen > 0).then_some(value)
}

/// Parse a leading non-negative integer that fits in `T`
pub(crate) fn parse_uint<T: TryFrom<i64>>(bytes: &[u8]) -> Option<T> {
    let value = parse_int(bytes)?;
    if value < 0 {
        return None;
    }
    T::try_from(value).ok()
}
