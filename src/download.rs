//! Piping a response body into a destination sink.
//!
//! Pipeline: body stream, then the optional progress stage, then the optional
//! digest stage, then the sink. The first failing stage fails the download;
//! bytes already written are left in place.

use futures_util::StreamExt;
use futures_util::future::Either;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::response::Response;
use crate::transform::{
    DigestStream, DigestValidator, ProgressCallback, ProgressStream, ValidateOptions,
};

/// Streams `response`'s body into `sink`, then flushes and shuts the sink down.
///
/// The progress stage reports against the declared `content-length` (0 when
/// missing). The digest stage fails the download on a checksum mismatch once
/// every byte has been written. The request's `max_body_bytes` cap applies:
/// a chunk that would cross it is not written and the transfer is aborted.
///
/// The validator is dropped with the pipeline, so
/// [`ValidateOptions::validate_on_end()`] set to false only skips the
/// comparison here. To compare later, wrap [`Response::stream`] in a
/// [`DigestStream`] and call [`DigestValidator::validate`] on it.
///
/// # Errors
///
/// - `AlreadyConsumed` if the body was already used
/// - `InvalidResponseBody` / `Aborted` if the body stream fails
/// - `ContentTooLarge` over `max_body_bytes`
/// - `ChecksumMismatch` if validation fails
/// - `Sink` if writing, flushing, or closing the sink fails
#[instrument(skip_all, fields(url = %response.url()))]
pub async fn download<W>(
    response: &mut Response,
    sink: &mut W,
    on_progress: Option<ProgressCallback>,
    validate: Option<ValidateOptions>,
) -> Result<(), FetchError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let total = response.content_length().unwrap_or(0);
    let limit = response.max_body_bytes();
    let body = response.stream()?;

    let staged = match on_progress {
        Some(callback) => Either::Left(ProgressStream::new(body, total, callback)),
        None => Either::Right(body),
    };
    let mut staged = match validate {
        Some(options) => Either::Left(DigestStream::new(staged, DigestValidator::new(options))),
        None => Either::Right(staged),
    };

    let mut written: u64 = 0;
    while let Some(chunk) = staged.next().await {
        let chunk = chunk?;
        let len = u64::try_from(chunk.len()).unwrap_or(u64::MAX);
        if limit > 0 && written.saturating_add(len) > limit {
            warn!(url = %response.url(), limit, "download over size limit, aborting");
            // Dropping the stages drops the body stream, which aborts the request.
            drop(staged);
            return Err(FetchError::content_too_large(response.url().as_str(), limit));
        }
        sink.write_all(&chunk)
            .await
            .map_err(|source| FetchError::Sink { source })?;
        written += len;
    }

    sink.flush().await.map_err(|source| FetchError::Sink { source })?;
    sink.shutdown()
        .await
        .map_err(|source| FetchError::Sink { source })?;
    debug!(written, "download complete");
    Ok(())
}
