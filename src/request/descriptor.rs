//! Immutable description of one request attempt.

use std::fmt;

use tokio_util::sync::CancellationToken;
use url::Url;

use super::body::OutgoingBody;
use crate::error::FetchError;
use crate::headers::HeaderTable;
use crate::session::SessionContext;

/// Username/password answered to login challenges.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates a credentials pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Normalized, validated request ready for the transport.
///
/// Built by [`RequestOptions::build`](super::RequestOptions::build). A redirect
/// hop produces a new descriptor through `next_hop`; a descriptor is never
/// edited in place.
#[derive(Debug)]
pub struct RequestDescriptor {
    pub(crate) method: String,
    pub(crate) url: Url,
    pub(crate) headers: HeaderTable,
    pub(crate) body: OutgoingBody,
    pub(crate) timeout_ms: u64,
    pub(crate) follow_redirect: bool,
    pub(crate) max_redirect_count: u32,
    pub(crate) max_body_bytes: u64,
    pub(crate) credentials: Option<Credentials>,
    pub(crate) session: Option<SessionContext>,
    pub(crate) use_session_cookies: bool,
    pub(crate) cancel: CancellationToken,
}

impl RequestDescriptor {
    /// Upper-cased request method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Target URL, including appended query parameters.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Normalized request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    /// Returns true if a body will be transmitted.
    #[must_use]
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    /// Timeout until the first response byte; 0 disables it.
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Whether 3xx responses are followed.
    #[must_use]
    pub fn follow_redirect(&self) -> bool {
        self.follow_redirect
    }

    /// Maximum number of redirect hops.
    #[must_use]
    pub fn max_redirect_count(&self) -> u32 {
        self.max_redirect_count
    }

    /// Response body byte cap; 0 means unlimited.
    #[must_use]
    pub fn max_body_bytes(&self) -> u64 {
        self.max_body_bytes
    }

    /// Credentials for login challenges.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Session partition the transport should scope cookies to.
    #[must_use]
    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    /// Whether the session's cookies are attached.
    #[must_use]
    pub fn use_session_cookies(&self) -> bool {
        self.use_session_cookies
    }

    /// Token that aborts this exchange when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Splits off the body for one attempt.
    ///
    /// Buffered bodies stay on the returned descriptor so a redirect can
    /// resend them; a streamed body can be sent only once.
    pub(crate) fn detach_body(self) -> (Self, OutgoingBody) {
        let (kept, outgoing) = self.body.detach();
        (Self { body: kept, ..self }, outgoing)
    }

    /// Produces the descriptor for the next redirect hop.
    ///
    /// With `rewrite_to_get` the method becomes GET and the body and its
    /// content-length are dropped; otherwise method and body carry over.
    ///
    /// # Errors
    ///
    /// Returns `BodyNotReplayable` when the body must carry over but was a
    /// stream already sent.
    pub(crate) fn next_hop(self, location: Url, rewrite_to_get: bool) -> Result<Self, FetchError> {
        if rewrite_to_get {
            let mut headers = self.headers;
            headers.delete("content-length");
            return Ok(Self {
                method: "GET".to_string(),
                url: location,
                headers,
                body: OutgoingBody::Empty,
                ..self
            });
        }

        if matches!(self.body, OutgoingBody::Spent) {
            return Err(FetchError::BodyNotReplayable {
                url: self.url.to_string(),
            });
        }

        Ok(Self {
            url: location,
            ..self
        })
    }
}
