//! Immutable byte buffer tagged with a MIME type.

use bytes::Bytes;

/// Immutable bytes plus a lower-cased MIME type.
///
/// Backed by [`Bytes`], so cloning and slicing share the underlying storage
/// without sharing any mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob {
    content: Bytes,
    content_type: String,
}

impl Blob {
    /// Creates a blob from `content` tagged with `content_type`.
    ///
    /// The type is lower-cased; a type containing anything outside printable
    /// ASCII is dropped to the empty string.
    #[must_use]
    pub fn new(content: impl Into<Bytes>, content_type: &str) -> Self {
        Self {
            content: content.into(),
            content_type: normalize_type(content_type),
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// MIME type, lower-cased, possibly empty.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The blob's bytes.
    #[must_use]
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Consumes the blob, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.content
    }

    /// Returns a new blob covering `start..end`.
    ///
    /// Negative offsets count back from the end. Offsets are clamped to the
    /// blob, and an inverted range yields an empty blob. When `content_type`
    /// is `None` the parent's type is kept.
    #[must_use]
    pub fn slice(&self, start: Option<i64>, end: Option<i64>, content_type: Option<&str>) -> Self {
        let size = self.size();
        let relative_start = start.map_or(0, |offset| resolve_offset(offset, size));
        let relative_end = end.map_or(size, |offset| resolve_offset(offset, size));
        let span = relative_end.saturating_sub(relative_start);

        Self {
            content: self
                .content
                .slice(relative_start..relative_start + span),
            content_type: content_type.map_or_else(|| self.content_type.clone(), normalize_type),
        }
    }
}

fn resolve_offset(offset: i64, size: usize) -> usize {
    let magnitude = usize::try_from(offset.unsigned_abs()).unwrap_or(usize::MAX);
    if offset < 0 {
        size.saturating_sub(magnitude)
    } else {
        magnitude.min(size)
    }
}

fn normalize_type(content_type: &str) -> String {
    if content_type.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        content_type.to_ascii_lowercase()
    } else {
        String::new()
    }
}
