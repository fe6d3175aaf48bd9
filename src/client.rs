//! Entry points.

use std::sync::{Arc, OnceLock};

use tracing::instrument;

use crate::error::FetchError;
use crate::redirect::RedirectCoordinator;
use crate::request::RequestOptions;
use crate::response::Response;
use crate::transport::{ClientConfig, ReqwestTransport, Transport};

/// Fetch client over a [`Transport`].
///
/// Cheap to clone; clones share the transport and its connection pools.
///
/// # Example
///
/// ```no_run
/// use netfetch::{Client, RequestOptions};
///
/// # async fn example() -> Result<(), netfetch::FetchError> {
/// let client = Client::new();
/// let mut response = client
///     .send(
///         "https://example.com/api",
///         RequestOptions::new().method("POST").body(r#"{"q":1}"#),
///     )
///     .await?;
/// if response.ok() {
///     let value: serde_json::Value = response.json().await?;
///     println!("{value}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates a client over the default reqwest-backed transport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    /// Creates a client over a reqwest-backed transport with explicit settings.
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_transport(ReqwestTransport::with_config(config))
    }

    /// Creates a client over any transport.
    #[must_use]
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Sends a request and follows redirects to the terminal response.
    ///
    /// Validation happens before any I/O. A non-2xx status still resolves.
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] except the body-consumption ones.
    #[instrument(skip(self, options), fields(url = %url))]
    pub async fn send(&self, url: &str, options: RequestOptions) -> Result<Response, FetchError> {
        let descriptor = options.build(url)?;
        RedirectCoordinator::new(self.transport.as_ref())
            .run(descriptor)
            .await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

fn shared_client() -> &'static Client {
    static SHARED: OnceLock<Client> = OnceLock::new();
    SHARED.get_or_init(Client::new)
}

/// Sends a request through a process-wide default [`Client`].
///
/// # Errors
///
/// Same as [`Client::send`].
pub async fn send(url: &str, options: RequestOptions) -> Result<Response, FetchError> {
    shared_client().send(url, options).await
}
