//! Normalization of caller options into a [`RequestDescriptor`].

use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::body::{OutgoingBody, RequestBody};
use super::descriptor::{Credentials, RequestDescriptor};
use crate::constants::{
    DEFAULT_ACCEPT, DEFAULT_CONNECTION, DEFAULT_MAX_REDIRECT_COUNT, DEFAULT_METHOD,
    DEFAULT_TIMEOUT_MS, SUPPORTED_ENCODINGS, TEXT_PLAIN_UTF8,
};
use crate::error::FetchError;
use crate::headers::grammar::is_http_token;
use crate::headers::{HeaderEntry, HeaderTable};
use crate::session::SessionContext;

/// Caller-facing request options.
///
/// Every field is optional; [`build`](Self::build) applies defaults and
/// validation and produces an immutable [`RequestDescriptor`].
///
/// # Example
///
/// ```
/// use netfetch::RequestOptions;
///
/// let descriptor = RequestOptions::new()
///     .method("post")
///     .header("X-Trace", "abc")
///     .query("page", "2")
///     .body("hello")
///     .build("https://example.com/items")
///     .unwrap();
///
/// assert_eq!(descriptor.method(), "POST");
/// assert_eq!(descriptor.url().as_str(), "https://example.com/items?page=2");
/// assert_eq!(
///     descriptor.headers().get("content-type").as_deref(),
///     Some("text/plain;charset=UTF-8")
/// );
/// ```
#[derive(Debug, Default)]
pub struct RequestOptions {
    method: Option<String>,
    headers: Vec<(String, HeaderEntry)>,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    follow_redirect: Option<bool>,
    max_redirect_count: Option<u32>,
    timeout_ms: Option<u64>,
    max_body_bytes: Option<u64>,
    credentials: Option<Credentials>,
    session: Option<SessionContext>,
    use_session_cookies: Option<bool>,
    cancel: Option<CancellationToken>,
}

impl RequestOptions {
    /// Creates empty options (GET, defaults everywhere).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the method; it is upper-cased on build.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets a header, replacing earlier values supplied for the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<HeaderEntry>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Appends a query parameter to the URL.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether 3xx responses are followed (default true).
    #[must_use]
    pub fn follow_redirect(mut self, follow: bool) -> Self {
        self.follow_redirect = Some(follow);
        self
    }

    /// Maximum redirect hops (default 20). 0 fails on the first redirect.
    #[must_use]
    pub fn max_redirect_count(mut self, count: u32) -> Self {
        self.max_redirect_count = Some(count);
        self
    }

    /// Timeout until the first response byte in milliseconds (default 60000, 0 disables).
    #[must_use]
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Response body byte cap for the buffering decoders (default 0, unlimited).
    #[must_use]
    pub fn max_body_bytes(mut self, limit: u64) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    /// Credentials answered to login challenges.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Session partition used to scope cookies.
    #[must_use]
    pub fn session(mut self, session: SessionContext) -> Self {
        self.session = Some(session);
        self
    }

    /// Whether the session's cookies are sent (default true).
    #[must_use]
    pub fn use_session_cookies(mut self, enabled: bool) -> Self {
        self.use_session_cookies = Some(enabled);
        self
    }

    /// Token that aborts the exchange when cancelled.
    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validates the options against `url` and produces a descriptor.
    ///
    /// # Errors
    ///
    /// - `InvalidMethod` if the method is not an HTTP token
    /// - `InvalidBodyForMethod` if a body accompanies GET or HEAD
    /// - `InvalidUrl` if `url` is not an absolute URL with a host
    /// - `UnsupportedProtocol` if the scheme is not http or https
    /// - `InvalidHeaderName` / `InvalidHeaderValue` for bad headers
    pub fn build(self, url: &str) -> Result<RequestDescriptor, FetchError> {
        let method = self
            .method
            .as_deref()
            .unwrap_or(DEFAULT_METHOD)
            .to_ascii_uppercase();
        if !is_http_token(&method) {
            return Err(FetchError::InvalidMethod { method });
        }
        if self.body.is_some() && (method == "GET" || method == "HEAD") {
            return Err(FetchError::InvalidBodyForMethod { method });
        }

        let mut parsed_url = parse_absolute_url(url)?;
        if !self.query.is_empty() {
            let mut pairs = parsed_url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }

        let mut headers = HeaderTable::new();
        for (name, value) in self.headers {
            headers.set(&name, value)?;
        }
        // Never trust a caller-supplied length; the transport derives it from the body.
        headers.delete("content-length");
        headers.set("accept-encoding", SUPPORTED_ENCODINGS.join(","))?;
        if !headers.has("accept") {
            headers.set("accept", DEFAULT_ACCEPT)?;
        }
        if !headers.has("connection") {
            headers.set("connection", DEFAULT_CONNECTION)?;
        }
        // user-agent is left to the transport's client configuration.

        let body = match self.body {
            None => OutgoingBody::Empty,
            Some(RequestBody::Text(text)) => {
                if !headers.has("content-type") {
                    headers.append("content-type", TEXT_PLAIN_UTF8)?;
                }
                OutgoingBody::Buffered(text.into())
            }
            Some(RequestBody::Bytes(bytes)) => OutgoingBody::Buffered(bytes),
            Some(RequestBody::Stream(stream)) => OutgoingBody::stream(stream),
        };

        debug!(method = %method, url = %parsed_url, headers = headers.len(), "request options normalized");

        Ok(RequestDescriptor {
            method,
            url: parsed_url,
            headers,
            body,
            timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            follow_redirect: self.follow_redirect.unwrap_or(true),
            max_redirect_count: self.max_redirect_count.unwrap_or(DEFAULT_MAX_REDIRECT_COUNT),
            max_body_bytes: self.max_body_bytes.unwrap_or(0),
            credentials: self.credentials,
            session: self.session,
            use_session_cookies: self.use_session_cookies.unwrap_or(true),
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

fn parse_absolute_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::invalid_url(url, e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::UnsupportedProtocol {
            scheme: parsed.scheme().to_string(),
        });
    }
    if parsed.host_str().unwrap_or_default().is_empty() {
        return Err(FetchError::invalid_url(url, "only absolute URLs are supported"));
    }
    Ok(parsed)
}
