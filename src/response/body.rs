//! Single-use response body stream.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, trace, warn};

use crate::error::FetchError;
use crate::transport::{ByteStream, TransportRequest};

/// Raw chunk stream of a response body.
///
/// Stream failures surface as `InvalidResponseBody`; a cancelled request
/// token surfaces as `Aborted`. Dropping the stream before it ends aborts the
/// underlying request.
pub struct BodyStream {
    inner: ByteStream,
    request: Box<dyn TransportRequest>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    url: String,
    finished: bool,
}

impl BodyStream {
    pub(crate) fn new(
        inner: ByteStream,
        request: Box<dyn TransportRequest>,
        cancel: &CancellationToken,
        url: String,
    ) -> Self {
        Self {
            inner,
            request,
            cancelled: Box::pin(cancel.clone().cancelled_owned()),
            url,
            finished: false,
        }
    }

    /// Stops the transfer and aborts the underlying request.
    pub fn abort(&mut self) {
        if !self.finished {
            self.finished = true;
            self.request.abort();
        }
    }
}

impl Stream for BodyStream {
    type Item = Result<Bytes, FetchError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        if this.cancelled.as_mut().poll(cx).is_ready() {
            warn!(url = %this.url, "response body cancelled by caller");
            this.abort();
            return Poll::Ready(Some(Err(FetchError::aborted(&this.url))));
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                trace!(len = chunk.len(), "body chunk");
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(error))) => {
                this.abort();
                Poll::Ready(Some(Err(FetchError::invalid_response_body(
                    &this.url,
                    error.to_string(),
                ))))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for BodyStream {
    fn drop(&mut self) {
        if !self.finished {
            debug!(url = %self.url, "body dropped before end, aborting request");
            self.request.abort();
        }
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream")
            .field("url", &self.url)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Body slot of a response: `disturbed` flips exactly once.
#[derive(Debug)]
pub(crate) struct ResponseBody {
    stream: Option<BodyStream>,
    disturbed: bool,
}

impl ResponseBody {
    pub(crate) fn new(stream: BodyStream) -> Self {
        Self {
            stream: Some(stream),
            disturbed: false,
        }
    }

    pub(crate) fn is_disturbed(&self) -> bool {
        self.disturbed
    }

    /// Hands out the stream on first use.
    pub(crate) fn take(&mut self, url: &str) -> Result<BodyStream, FetchError> {
        if self.disturbed {
            return Err(FetchError::already_consumed(url));
        }
        self.disturbed = true;
        self.stream
            .take()
            .ok_or_else(|| FetchError::already_consumed(url))
    }
}
