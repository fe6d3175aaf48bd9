//! Response handed back to the caller.
//!
//! The body can be consumed once, through a decoder or as a raw stream.
//! Buffering decoders and [`download`](Response::download) enforce the
//! request's `max_body_bytes` cap.

mod body;
mod decode;

use std::fmt;

use bytes::Bytes;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWrite;
use tracing::warn;
use url::Url;

use crate::blob::Blob;
use crate::error::FetchError;
use crate::headers::HeaderTable;
use crate::transform::{ProgressCallback, ValidateOptions};
use crate::transport::Exchange;

pub use body::BodyStream;
pub use decode::TextEncoding;

use self::body::ResponseBody;

/// Terminal response of an exchange, after any redirects.
///
/// A non-2xx status is still a response; check [`ok`](Self::ok).
pub struct Response {
    status: u16,
    headers: HeaderTable,
    url: Url,
    redirect_count: u32,
    max_body_bytes: u64,
    body: ResponseBody,
}

impl Response {
    pub(crate) fn new(
        exchange: Exchange,
        url: Url,
        redirect_count: u32,
        max_body_bytes: u64,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Self {
        let Exchange { response, request } = exchange;
        let stream = BodyStream::new(response.body, request, cancel, url.to_string());
        Self {
            status: response.status,
            headers: response.headers,
            url,
            redirect_count,
            max_body_bytes,
            body: ResponseBody::new(stream),
        }
    }

    /// True for a status in `200..300`.
    #[must_use]
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    /// Final URL, after redirects.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Number of redirect hops followed to reach this response.
    #[must_use]
    pub fn redirect_count(&self) -> u32 {
        self.redirect_count
    }

    /// Declared `content-length`, if present and numeric.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.headers.content_length()
    }

    pub(crate) fn max_body_bytes(&self) -> u64 {
        self.max_body_bytes
    }

    /// True once the body has been handed out.
    #[must_use]
    pub fn body_used(&self) -> bool {
        self.body.is_disturbed()
    }

    /// Takes the raw chunk stream. The size cap does not apply to it.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyConsumed` if the body was already used.
    pub fn stream(&mut self) -> Result<BodyStream, FetchError> {
        self.body.take(self.url.as_str())
    }

    /// Reads the whole body, enforcing `max_body_bytes`.
    async fn consume(&mut self) -> Result<Bytes, FetchError> {
        let mut stream = self.stream()?;
        let limit = self.max_body_bytes;
        let mut chunks: Vec<Bytes> = Vec::new();
        let mut received: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            received += u64::try_from(chunk.len()).unwrap_or(u64::MAX);
            if limit > 0 && received > limit {
                warn!(url = %self.url, limit, "response body over size limit, aborting");
                stream.abort();
                return Err(FetchError::content_too_large(self.url.as_str(), limit));
            }
            chunks.push(chunk);
        }

        Ok(match chunks.len() {
            0 => Bytes::new(),
            1 => chunks.swap_remove(0),
            _ => Bytes::from(chunks.concat()),
        })
    }

    /// Body as shared bytes; a single-chunk body is returned without copying.
    ///
    /// # Errors
    ///
    /// - `AlreadyConsumed` if the body was already used
    /// - `ContentTooLarge` over `max_body_bytes`
    /// - `InvalidResponseBody` if the stream fails
    pub async fn array_buffer(&mut self) -> Result<Bytes, FetchError> {
        self.consume().await
    }

    /// Body as an owned byte vector.
    ///
    /// # Errors
    ///
    /// Same as [`array_buffer`](Self::array_buffer).
    pub async fn buffer(&mut self) -> Result<Vec<u8>, FetchError> {
        Ok(self.consume().await?.to_vec())
    }

    /// Body as a [`Blob`] tagged with the lower-cased `content-type`.
    ///
    /// # Errors
    ///
    /// Same as [`array_buffer`](Self::array_buffer).
    pub async fn blob(&mut self) -> Result<Blob, FetchError> {
        let content = self.consume().await?;
        let content_type = self.headers.get("content-type").unwrap_or_default();
        Ok(Blob::new(content, &content_type))
    }

    /// Body decoded as UTF-8.
    ///
    /// # Errors
    ///
    /// Same as [`array_buffer`](Self::array_buffer).
    pub async fn text(&mut self) -> Result<String, FetchError> {
        self.text_with_encoding(TextEncoding::Utf8).await
    }

    /// Body decoded with `encoding`.
    ///
    /// # Errors
    ///
    /// Same as [`array_buffer`](Self::array_buffer).
    pub async fn text_with_encoding(&mut self, encoding: TextEncoding) -> Result<String, FetchError> {
        Ok(encoding.decode(&self.consume().await?))
    }

    /// Body parsed as JSON from UTF-8 text.
    ///
    /// # Errors
    ///
    /// `InvalidJson` (carrying the raw text) if parsing fails, otherwise as
    /// [`array_buffer`](Self::array_buffer).
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, FetchError> {
        self.json_with_encoding(TextEncoding::Utf8).await
    }

    /// Body parsed as JSON from text decoded with `encoding`.
    ///
    /// # Errors
    ///
    /// Same as [`json`](Self::json).
    pub async fn json_with_encoding<T: DeserializeOwned>(
        &mut self,
        encoding: TextEncoding,
    ) -> Result<T, FetchError> {
        let text = self.text_with_encoding(encoding).await?;
        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(source) => Err(FetchError::InvalidJson { text, source }),
        }
    }

    /// Pipes the body into `sink`; see [`crate::download()`].
    ///
    /// # Errors
    ///
    /// Same as [`crate::download()`].
    pub async fn download<W>(
        &mut self,
        sink: &mut W,
        on_progress: Option<ProgressCallback>,
        validate: Option<ValidateOptions>,
    ) -> Result<(), FetchError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        crate::download::download(self, sink, on_progress, validate).await
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("redirect_count", &self.redirect_count)
            .field("body_used", &self.body_used())
            .finish_non_exhaustive()
    }
}
