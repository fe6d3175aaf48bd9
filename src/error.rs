//! Error types for the fetch engine.
//!
//! Every failure surfaces as a [`FetchError`] carrying enough context (URL,
//! header name, limit, algorithm) to diagnose it, plus a stable
//! [`code`](FetchError::code) and a coarse [`ErrorKind`] category for callers
//! that branch on the class of failure rather than the exact variant.

use thiserror::Error;

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad header, method, URL, or a body attached to GET/HEAD.
    Validation,
    /// Unsupported URL scheme.
    Protocol,
    /// Transport failure, abort, or rejected login challenge.
    Network,
    /// No response arrived within the configured timeout.
    Timeout,
    /// Redirect could not be followed.
    Redirect,
    /// Response body exceeded the configured byte cap.
    SizeLimit,
    /// Streaming checksum did not match.
    Integrity,
    /// Body consumed twice, or a digest read before the stream finished.
    Consumption,
    /// Body could not be decoded (malformed JSON).
    Decode,
    /// Writing to the download destination failed.
    Io,
}

impl ErrorKind {
    /// Returns the stable string label for this category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Protocol => "protocol",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Redirect => "redirect",
            Self::SizeLimit => "size_limit",
            Self::Integrity => "integrity",
            Self::Consumption => "consumption",
            Self::Decode => "decode",
            Self::Io => "io",
        }
    }
}

/// Errors that can occur while sending a request or consuming its response.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Header name does not satisfy the HTTP token grammar.
    #[error("{name:?} is not a legal HTTP header name")]
    InvalidHeaderName {
        /// The rejected header name.
        name: String,
    },

    /// Header value contains a control byte or a character above U+00FF.
    #[error("value {value:?} for header {name:?} is not a legal HTTP header value")]
    InvalidHeaderValue {
        /// The header the value was destined for.
        name: String,
        /// The rejected value.
        value: String,
    },

    /// Method is not a valid HTTP token.
    #[error("{method:?} is not a valid HTTP method")]
    InvalidMethod {
        /// The rejected method.
        method: String,
    },

    /// URL could not be parsed or is not absolute.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A body was supplied for a GET or HEAD request.
    #[error("request with {method} method cannot have a body")]
    InvalidBodyForMethod {
        /// The method that forbids a body.
        method: String,
    },

    /// URL scheme is not http or https.
    #[error("unsupported protocol {scheme:?}: only HTTP(S) is supported")]
    UnsupportedProtocol {
        /// The rejected scheme.
        scheme: String,
    },

    /// Transport-level failure (connect, TLS, reset, protocol error).
    #[error("network error requesting {url}: {message}")]
    Network {
        /// The URL being requested.
        url: String,
        /// Transport-provided description.
        message: String,
    },

    /// Request was aborted before a response completed.
    #[error("request to {url} was aborted")]
    Aborted {
        /// The URL being requested.
        url: String,
    },

    /// Server or proxy challenged for credentials and none were supplied.
    #[error("login challenge received from {host} but no credentials provided")]
    LoginRejected {
        /// The URL being requested.
        url: String,
        /// Host that issued the challenge.
        host: String,
    },

    /// No response arrived within the configured timeout.
    #[error("request to {url} timed out after {timeout_ms} ms")]
    Timeout {
        /// The URL being requested.
        url: String,
        /// The configured timeout.
        timeout_ms: u64,
    },

    /// Redirect response carried no Location header.
    #[error("redirect location header missing at {url}")]
    MissingLocationHeader {
        /// URL that answered with the redirect.
        url: String,
    },

    /// Redirect ceiling reached.
    #[error("maximum redirect count ({max}) reached at {url}")]
    MaxRedirectsExceeded {
        /// URL that answered with the redirect.
        url: String,
        /// Configured ceiling.
        max: u32,
    },

    /// A streamed request body must be resent by a method-preserving redirect.
    #[error("redirect from {url} requires resending a streamed request body")]
    BodyNotReplayable {
        /// URL that answered with the redirect.
        url: String,
    },

    /// Response body exceeded `max_body_bytes`.
    #[error("content size at {url} over limit: {limit}")]
    ContentTooLarge {
        /// The response URL.
        url: String,
        /// Configured byte cap.
        limit: u64,
    },

    /// Response body stream failed mid-transfer.
    #[error("invalid response body while trying to fetch {url}: {message}")]
    InvalidResponseBody {
        /// The response URL.
        url: String,
        /// Cause reported by the stream.
        message: String,
    },

    /// Streamed digest did not match the expected value.
    #[error("{algorithm} checksum mismatch, expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digest algorithm name.
        algorithm: String,
        /// Expected encoded digest.
        expected: String,
        /// Actual encoded digest.
        actual: String,
    },

    /// Digest algorithm or encoding name not recognised.
    #[error("unsupported digest {name:?}")]
    UnsupportedDigest {
        /// The rejected algorithm or encoding name.
        name: String,
    },

    /// Response body was already consumed.
    #[error("response used already for: {url}")]
    AlreadyConsumed {
        /// The response URL.
        url: String,
    },

    /// Digest queried before the stream finished.
    #[error("not finished yet")]
    NotFinished,

    /// Response body is not valid JSON. Carries the raw text.
    #[error("invalid JSON in response body: {source}; body: {text}")]
    InvalidJson {
        /// Raw decoded text of the body.
        text: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// Writing to the download destination failed.
    #[error("failed writing download destination: {source}")]
    Sink {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Creates an invalid header name error.
    pub fn invalid_header_name(name: impl Into<String>) -> Self {
        Self::InvalidHeaderName { name: name.into() }
    }

    /// Creates an invalid header value error.
    pub fn invalid_header_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidHeaderValue {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a network error.
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an aborted error.
    pub fn aborted(url: impl Into<String>) -> Self {
        Self::Aborted { url: url.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            url: url.into(),
            timeout_ms,
        }
    }

    /// Creates a content-too-large error.
    pub fn content_too_large(url: impl Into<String>, limit: u64) -> Self {
        Self::ContentTooLarge {
            url: url.into(),
            limit,
        }
    }

    /// Creates an invalid response body error.
    pub fn invalid_response_body(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponseBody {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an already-consumed error.
    pub fn already_consumed(url: impl Into<String>) -> Self {
        Self::AlreadyConsumed { url: url.into() }
    }

    /// Returns the coarse category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHeaderName { .. }
            | Self::InvalidHeaderValue { .. }
            | Self::InvalidMethod { .. }
            | Self::InvalidUrl { .. }
            | Self::InvalidBodyForMethod { .. }
            | Self::UnsupportedDigest { .. } => ErrorKind::Validation,
            Self::UnsupportedProtocol { .. } => ErrorKind::Protocol,
            Self::Network { .. }
            | Self::Aborted { .. }
            | Self::LoginRejected { .. }
            | Self::InvalidResponseBody { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::MissingLocationHeader { .. }
            | Self::MaxRedirectsExceeded { .. }
            | Self::BodyNotReplayable { .. } => ErrorKind::Redirect,
            Self::ContentTooLarge { .. } => ErrorKind::SizeLimit,
            Self::ChecksumMismatch { .. } => ErrorKind::Integrity,
            Self::AlreadyConsumed { .. } | Self::NotFinished => ErrorKind::Consumption,
            Self::InvalidJson { .. } => ErrorKind::Decode,
            Self::Sink { .. } => ErrorKind::Io,
        }
    }

    /// Returns the stable error code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidHeaderName { .. } => "ERR_INVALID_HEADER_NAME",
            Self::InvalidHeaderValue { .. } => "ERR_INVALID_HEADER_VALUE",
            Self::InvalidMethod { .. } => "ERR_INVALID_METHOD",
            Self::InvalidUrl { .. } => "ERR_INVALID_URL",
            Self::InvalidBodyForMethod { .. } => "ERR_INVALID_BODY_FOR_METHOD",
            Self::UnsupportedProtocol { .. } => "ERR_UNSUPPORTED_PROTOCOL",
            Self::Network { .. } => "ERR_NETWORK",
            Self::Aborted { .. } => "ERR_ABORTED",
            Self::LoginRejected { .. } => "ERR_LOGIN_REJECTED",
            Self::Timeout { .. } => "ERR_TIMEOUT",
            Self::MissingLocationHeader { .. } => "ERR_MISSING_LOCATION_HEADER",
            Self::MaxRedirectsExceeded { .. } => "ERR_MAX_REDIRECTS_EXCEEDED",
            Self::BodyNotReplayable { .. } => "ERR_BODY_NOT_REPLAYABLE",
            Self::ContentTooLarge { .. } => "ERR_CONTENT_TOO_LARGE",
            Self::InvalidResponseBody { .. } => "ERR_INVALID_RESPONSE_BODY",
            Self::ChecksumMismatch { .. } => "ERR_CHECKSUM_MISMATCH",
            Self::UnsupportedDigest { .. } => "ERR_UNSUPPORTED_DIGEST",
            Self::AlreadyConsumed { .. } => "ERR_ALREADY_CONSUMED",
            Self::NotFinished => "ERR_STREAM_NOT_FINISHED",
            Self::InvalidJson { .. } => "ERR_INVALID_JSON",
            Self::Sink { .. } => "ERR_SINK_WRITE",
        }
    }
}
