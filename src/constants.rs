//! Constants for request defaults, transport tuning, and progress reporting.

use std::time::Duration;

/// Default method when the caller supplies none.
pub const DEFAULT_METHOD: &str = "GET";

/// Default redirect ceiling.
pub const DEFAULT_MAX_REDIRECT_COUNT: u32 = 20;

/// Default request timeout (60 seconds), measured until the first response byte.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default connect timeout for the reqwest-backed transport (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Compressors advertised in `accept-encoding`; the transport decodes all of them.
pub const SUPPORTED_ENCODINGS: &[&str] = &["gzip", "deflate", "br"];

/// Default `accept` header.
pub const DEFAULT_ACCEPT: &str = "*/*";

/// Default `connection` header.
pub const DEFAULT_CONNECTION: &str = "close";

/// Content type applied to text bodies without an explicit one.
pub const TEXT_PLAIN_UTF8: &str = "text/plain;charset=UTF-8";

/// Name of the session partition used when the caller supplies none.
pub const DEFAULT_PARTITION: &str = "default";

/// Request bodies up to this size are buffered and sent with a content-length.
pub const BUFFERED_BODY_LIMIT: usize = 64 * 1024;

/// Capacity (in chunks) of the channel feeding a streamed request body.
pub const UPLOAD_CHANNEL_CAPACITY: usize = 16;

/// Minimum interval between two intermediate progress events.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(1000);

/// Statuses that trigger redirect handling.
pub const REDIRECT_STATUSES: &[u16] = &[301, 302, 303, 307, 308];
