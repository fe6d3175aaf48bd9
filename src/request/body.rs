//! Request body inputs.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use futures_util::Stream;

use crate::transport::ByteStream;

/// Body supplied by the caller.
pub enum RequestBody {
    /// UTF-8 text; tagged `text/plain;charset=UTF-8` unless a content-type is set.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// Streamed bytes, written chunk by chunk. Cannot be replayed.
    Stream(ByteStream),
}

impl RequestBody {
    /// Wraps a chunk stream as a request body.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for RequestBody {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(bytes))
    }
}

/// Body as carried by a descriptor for one attempt.
///
/// The stream sits behind a mutex so descriptors stay `Sync` and can be
/// borrowed across await points in `Send` futures.
pub(crate) enum OutgoingBody {
    Empty,
    Buffered(Bytes),
    Stream(Mutex<ByteStream>),
    /// A stream already handed to the transport by an earlier attempt.
    Spent,
}

impl OutgoingBody {
    pub(crate) fn stream(stream: ByteStream) -> Self {
        Self::Stream(Mutex::new(stream))
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Takes the stream out of a `Stream` body.
    pub(crate) fn into_stream(stream: Mutex<ByteStream>) -> ByteStream {
        stream.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Splits off the body to transmit, leaving what a replay would resend.
    pub(crate) fn detach(self) -> (Self, Self) {
        match self {
            Self::Buffered(bytes) => (Self::Buffered(bytes.clone()), Self::Buffered(bytes)),
            Self::Stream(stream) => (Self::Spent, Self::Stream(stream)),
            Self::Empty => (Self::Empty, Self::Empty),
            Self::Spent => (Self::Spent, Self::Empty),
        }
    }
}

impl fmt::Debug for OutgoingBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
            Self::Spent => f.write_str("Spent"),
        }
    }
}
