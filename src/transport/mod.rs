//! Low-level streaming request primitive.
//!
//! A [`Transport`] opens one [`TransportRequest`] per physical attempt. The
//! request is event driven: headers are set line by line, the body is written
//! chunk by chunk, `end` finishes the upload, and `next_event` reports the
//! single outcome (response, error, abort, or login challenge).
//!
//! [`ReqwestTransport`] is the production implementation. Tests drive the
//! engine through an in-memory scripted transport instead.

pub mod client;
pub mod reqwest_transport;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use crate::error::FetchError;
use crate::headers::HeaderTable;
use crate::request::{Credentials, RequestDescriptor};

pub use client::{Exchange, TransportClient};
pub use reqwest_transport::{ClientConfig, ReqwestTransport};

/// Boxed stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Factory for physical request attempts.
pub trait Transport: Send + Sync {
    /// Opens a request for `descriptor`'s method, URL, and session.
    ///
    /// Headers and body are supplied afterwards through the returned handle.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the underlying client cannot be created.
    fn open(&self, descriptor: &RequestDescriptor) -> Result<Box<dyn TransportRequest>, FetchError>;
}

/// Handle to one in-flight request.
#[async_trait]
pub trait TransportRequest: Send {
    /// Adds one header line. Repeated names produce repeated lines.
    ///
    /// # Errors
    ///
    /// Returns a header validation error if the transport rejects the line.
    fn set_header(&mut self, name: &str, value: &str) -> Result<(), FetchError>;

    /// Writes one body chunk.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the upload channel is gone.
    async fn write(&mut self, chunk: Bytes) -> Result<(), FetchError>;

    /// Finishes the upload and dispatches the request.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the request cannot be dispatched.
    async fn end(&mut self) -> Result<(), FetchError>;

    /// Waits for the next outcome.
    async fn next_event(&mut self) -> TransportEvent;

    /// Answers the pending login challenge; the next outcome arrives through
    /// [`next_event`](Self::next_event).
    fn authenticate(&mut self, credentials: &Credentials);

    /// Cancels the request and its response body. Calling it again is a no-op.
    fn abort(&mut self);
}

/// Outcome reported by [`TransportRequest::next_event`].
pub enum TransportEvent {
    /// Response head arrived; the body streams from `RawResponse::body`.
    Response(RawResponse),
    /// Network or protocol failure.
    Error(String),
    /// The request was aborted.
    Aborted,
    /// Server or proxy asked for credentials.
    Login(AuthChallenge),
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(response) => f.debug_tuple("Response").field(response).finish(),
            Self::Error(message) => f.debug_tuple("Error").field(message).finish(),
            Self::Aborted => f.write_str("Aborted"),
            Self::Login(challenge) => f.debug_tuple("Login").field(challenge).finish(),
        }
    }
}

/// Response head plus its unread body.
pub struct RawResponse {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderTable,
    /// Body chunks. Ending early is signalled by `abort` on the request.
    pub body: ByteStream,
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Credentials request issued by a server (401) or proxy (407).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    /// Host that issued the challenge.
    pub host: String,
    /// Port of the challenging host, if known.
    pub port: Option<u16>,
    /// Authentication scheme, e.g. `Basic`.
    pub scheme: String,
    /// Realm parameter, if present.
    pub realm: Option<String>,
    /// True for a proxy challenge.
    pub is_proxy: bool,
}

impl AuthChallenge {
    /// Parses a `WWW-Authenticate` / `Proxy-Authenticate` value.
    #[must_use]
    pub fn parse(host: &str, port: Option<u16>, header: &str, is_proxy: bool) -> Self {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));
        let realm = params.split(',').find_map(|param| {
            let (key, value) = param.trim().split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("realm")
                .then(|| value.trim().trim_matches('"').to_string())
        });
        Self {
            host: host.to_string(),
            port,
            scheme: scheme.to_string(),
            realm,
            is_proxy,
        }
    }
}
