//! Drives exactly one physical request attempt.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace, warn};

use super::{RawResponse, Transport, TransportEvent, TransportRequest};
use crate::error::FetchError;
use crate::request::{OutgoingBody, RequestDescriptor};

/// Response head plus the request handle that owns its body.
pub struct Exchange {
    /// Response head and body stream.
    pub response: RawResponse,
    /// Handle used to abort the body transfer.
    pub request: Box<dyn TransportRequest>,
}

/// Runs one attempt of a descriptor through a [`Transport`].
///
/// The timeout timer starts when the attempt starts and is disarmed as soon as
/// the response head arrives; body reads are not covered by it.
pub struct TransportClient<'a> {
    transport: &'a dyn Transport,
}

enum Outcome {
    Finished(Result<RawResponse, FetchError>),
    Cancelled,
    TimedOut,
}

impl<'a> TransportClient<'a> {
    /// Creates a client over `transport`.
    #[must_use]
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Sends `descriptor` with `body` and waits for the response head.
    ///
    /// # Errors
    ///
    /// - `Network` for transport failures
    /// - `Aborted` if the cancel token fires or the transport aborts
    /// - `Timeout` if no response arrives within the descriptor's timeout
    /// - `LoginRejected` for a challenge with no credentials to answer it
    pub(crate) async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        body: OutgoingBody,
    ) -> Result<Exchange, FetchError> {
        let url = descriptor.url().as_str();
        let cancel = descriptor.cancel_token();
        if cancel.is_cancelled() {
            return Err(FetchError::aborted(url));
        }

        let mut request = self.transport.open(descriptor)?;
        for (name, value) in descriptor.headers().lines() {
            request.set_header(name, &value)?;
        }

        let timeout_ms = descriptor.timeout_ms();
        let deadline =
            (timeout_ms > 0).then(|| Instant::now() + Duration::from_millis(timeout_ms));

        debug!(method = descriptor.method(), url, "dispatching request");
        let outcome = {
            let exchange = drive(request.as_mut(), descriptor, body);
            tokio::select! {
                biased;
                () = cancel.cancelled() => Outcome::Cancelled,
                () = expire(deadline) => Outcome::TimedOut,
                result = exchange => Outcome::Finished(result),
            }
        };

        match outcome {
            Outcome::Finished(Ok(response)) => {
                debug!(status = response.status, url, "response head received");
                Ok(Exchange { response, request })
            }
            Outcome::Finished(Err(error)) => {
                request.abort();
                Err(error)
            }
            Outcome::Cancelled => {
                warn!(url, "request cancelled by caller");
                request.abort();
                Err(FetchError::aborted(url))
            }
            Outcome::TimedOut => {
                warn!(url, timeout_ms, "request timed out");
                request.abort();
                Err(FetchError::timeout(url, timeout_ms))
            }
        }
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn drive(
    request: &mut dyn TransportRequest,
    descriptor: &RequestDescriptor,
    body: OutgoingBody,
) -> Result<RawResponse, FetchError> {
    let url = descriptor.url().as_str();

    match body {
        OutgoingBody::Buffered(bytes) => request.write(bytes).await?,
        OutgoingBody::Stream(stream) => {
            let mut stream = OutgoingBody::into_stream(stream);
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| FetchError::network(url, e.to_string()))?;
                trace!(len = chunk.len(), "writing request body chunk");
                request.write(chunk).await?;
            }
        }
        OutgoingBody::Empty | OutgoingBody::Spent => {}
    }
    request.end().await?;

    let mut answered_login = false;
    loop {
        match request.next_event().await {
            TransportEvent::Response(response) => return Ok(response),
            TransportEvent::Error(message) => return Err(FetchError::network(url, message)),
            TransportEvent::Aborted => return Err(FetchError::aborted(url)),
            TransportEvent::Login(challenge) => match descriptor.credentials() {
                Some(credentials) if !answered_login => {
                    debug!(host = %challenge.host, proxy = challenge.is_proxy, "answering login challenge");
                    answered_login = true;
                    request.authenticate(credentials);
                }
                _ => {
                    warn!(host = %challenge.host, "login challenge rejected");
                    return Err(FetchError::LoginRejected {
                        url: url.to_string(),
                        host: challenge.host,
                    });
                }
            },
        }
    }
}
