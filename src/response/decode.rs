//! Byte-to-text decoding for `text()` and `json()`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::headers::grammar::from_latin1;

/// Encoding used to turn a response body into text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// UTF-8; invalid sequences become U+FFFD (default).
    #[default]
    Utf8,
    /// One char per byte.
    Latin1,
    /// 7-bit ASCII; the high bit of every byte is cleared.
    Ascii,
    /// UTF-16 little endian; a trailing odd byte is dropped.
    Utf16Le,
    /// Standard base64 of the raw bytes.
    Base64,
    /// Lower-case hex of the raw bytes.
    Hex,
}

impl TextEncoding {
    /// Decodes `bytes` into a string.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => from_latin1(bytes),
            Self::Ascii => bytes.iter().map(|b| char::from(b & 0x7f)).collect(),
            Self::Utf16Le => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            Self::Base64 => STANDARD.encode(bytes),
            Self::Hex => hex::encode(bytes),
        }
    }
}
