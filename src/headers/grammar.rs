//! HTTP header name and value grammar checks.
//!
//! Names must be RFC 9110 tokens: letters, digits and the punctuation
//! `!#$%&'*+-.^_`|~`. Values may contain horizontal tab and any character up to
//! U+00FF except the C0 controls and DEL.

/// Returns true if `byte` is allowed in an HTTP token.
#[must_use]
pub fn is_token_char(byte: u8) -> bool {
    match byte {
        b'^'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'|' | b'~' => true,
        b'"' | b'(' | b')' | b',' => false,
        b'!'..=b'.' => true,
        _ => false,
    }
}

/// Returns true if `name` is a non-empty HTTP token.
#[must_use]
pub fn is_http_token(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_token_char)
}

/// Returns true if `value` contains a character that may not appear in a header value.
#[must_use]
pub fn has_invalid_value_char(value: &str) -> bool {
    value.chars().any(|c| {
        let code = u32::from(c);
        (code <= 31 && code != 9) || code == 127 || code > 255
    })
}

/// Encodes a validated header value as ISO-8859-1 bytes.
///
/// Characters above U+00FF are never present in a validated value; they are
/// replaced with `?` rather than truncated.
#[must_use]
pub(crate) fn to_latin1(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Decodes ISO-8859-1 header bytes back into a string.
#[must_use]
pub(crate) fn from_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
