//! Streaming request primitive backed by `reqwest`.
//!
//! Redirects are never followed here (the coordinator owns them), responses
//! are decompressed transparently unless disabled, and each session partition
//! gets its own pooled client carrying the partition's cookie jar.

use std::error::Error as _;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind, set_hook, take_hook};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{
    ACCEPT_ENCODING, HeaderMap, HeaderName, HeaderValue, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION,
    WWW_AUTHENTICATE,
};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, StatusCode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};
use url::Url;

use super::{AuthChallenge, RawResponse, Transport, TransportEvent, TransportRequest};
use crate::constants::{BUFFERED_BODY_LIMIT, CONNECT_TIMEOUT_SECS, UPLOAD_CHANNEL_CAPACITY};
use crate::error::FetchError;
use crate::headers::HeaderTable;
use crate::headers::grammar::to_latin1;
use crate::request::{Credentials, RequestDescriptor};
use crate::user_agent;

/// Settings shared by every client the transport builds.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// User agent sent when a request carries none.
    pub user_agent: String,
    /// Whether gzip, deflate, and brotli responses are decoded. When off,
    /// requests ask for `identity` instead of the advertised compressors.
    pub decompress: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            user_agent: user_agent::default_user_agent(),
            decompress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ClientKey {
    Partition(String),
    NoCookies,
}

/// [`Transport`] implementation over `reqwest`.
///
/// # Example
///
/// ```no_run
/// use netfetch::{Client, ReqwestTransport, RequestOptions};
///
/// # async fn example() -> Result<(), netfetch::FetchError> {
/// let client = Client::with_transport(ReqwestTransport::new());
/// let mut response = client.send("https://example.com/", RequestOptions::new()).await?;
/// println!("{}", response.text().await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ReqwestTransport {
    config: ClientConfig,
    clients: DashMap<ClientKey, Client>,
}

impl ReqwestTransport {
    /// Creates a transport with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a transport with explicit client settings.
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    fn client_for(&self, descriptor: &RequestDescriptor) -> Result<Client, reqwest::Error> {
        let (key, jar) = if descriptor.use_session_cookies() {
            let session = descriptor.session().cloned().unwrap_or_default();
            (
                ClientKey::Partition(session.partition().to_string()),
                Some(session.cookie_jar()),
            )
        } else {
            (ClientKey::NoCookies, None)
        };

        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }
        debug!(?key, "building HTTP client");
        let client = build_client(&self.config, jar)?;
        Ok(self.clients.entry(key).or_insert(client).clone())
    }
}

impl Transport for ReqwestTransport {
    fn open(&self, descriptor: &RequestDescriptor) -> Result<Box<dyn TransportRequest>, FetchError> {
        let url = descriptor.url();
        let client = self
            .client_for(descriptor)
            .map_err(|e| FetchError::network(url.as_str(), describe(&e)))?;
        let method = Method::from_bytes(descriptor.method().as_bytes()).map_err(|_| {
            FetchError::InvalidMethod {
                method: descriptor.method().to_string(),
            }
        })?;
        Ok(Box::new(ReqwestRequest::new(
            client,
            method,
            url.clone(),
            self.config.decompress,
        )))
    }
}

struct ReqwestRequest {
    client: Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    decompress: bool,
    body: BytesMut,
    sent_body: Bytes,
    upload: Option<mpsc::Sender<Result<Bytes, io::Error>>>,
    streamed: bool,
    pending: Option<JoinHandle<reqwest::Result<reqwest::Response>>>,
    failure: Option<String>,
    challenged: bool,
    challenge_is_proxy: bool,
    aborted: CancellationToken,
}

impl ReqwestRequest {
    fn new(client: Client, method: Method, url: Url, decompress: bool) -> Self {
        Self {
            client,
            method,
            url,
            headers: HeaderMap::new(),
            decompress,
            body: BytesMut::new(),
            sent_body: Bytes::new(),
            upload: None,
            streamed: false,
            pending: None,
            failure: None,
            challenged: false,
            challenge_is_proxy: false,
            aborted: CancellationToken::new(),
        }
    }

    fn request_builder(&self) -> RequestBuilder {
        self.client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone())
    }

    fn dispatch(&mut self, request: RequestBuilder) {
        self.pending = Some(tokio::spawn(request.send()));
    }

    async fn start_streaming_upload(&mut self) -> Result<(), FetchError> {
        debug!(url = %self.url, buffered = self.body.len(), "switching to streamed upload");
        let (sender, receiver) = mpsc::channel(UPLOAD_CHANNEL_CAPACITY);
        let chunks = futures_util::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|chunk| (chunk, receiver))
        });
        let request = self
            .request_builder()
            .body(reqwest::Body::wrap_stream(chunks));
        self.dispatch(request);
        self.streamed = true;

        let buffered = std::mem::take(&mut self.body).freeze();
        sender
            .send(Ok(buffered))
            .await
            .map_err(|_| FetchError::network(self.url.as_str(), "upload channel closed"))?;
        self.upload = Some(sender);
        Ok(())
    }

    fn challenge_for(&self, response: &reqwest::Response) -> Option<AuthChallenge> {
        if self.challenged {
            return None;
        }
        let (header, is_proxy) = match response.status() {
            StatusCode::UNAUTHORIZED => (WWW_AUTHENTICATE, false),
            StatusCode::PROXY_AUTHENTICATION_REQUIRED => (PROXY_AUTHENTICATE, true),
            _ => return None,
        };
        let value = response.headers().get(header)?.to_str().ok()?;
        let url = response.url();
        Some(AuthChallenge::parse(
            url.host_str().unwrap_or_default(),
            url.port_or_known_default(),
            value,
            is_proxy,
        ))
    }

    fn response_event(&self, response: reqwest::Response) -> TransportEvent {
        let headers = match HeaderTable::try_from(response.headers()) {
            Ok(headers) => headers,
            Err(e) => return TransportEvent::Error(e.to_string()),
        };
        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| {
                if let Ok(bytes) = &chunk {
                    trace!(len = bytes.len(), "response body chunk");
                }
                chunk.map_err(io::Error::other)
            })
            .take_until(self.aborted.clone().cancelled_owned());
        TransportEvent::Response(RawResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}

#[async_trait]
impl TransportRequest for ReqwestRequest {
    fn set_header(&mut self, name: &str, value: &str) -> Result<(), FetchError> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::invalid_header_name(name))?;
        if !self.decompress && header_name == ACCEPT_ENCODING {
            // The client would hand compressed bytes back undecoded.
            self.headers
                .insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
            return Ok(());
        }
        let header_value = HeaderValue::from_bytes(&to_latin1(value))
            .map_err(|_| FetchError::invalid_header_value(name, value))?;
        self.headers.append(header_name, header_value);
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), FetchError> {
        if let Some(sender) = &self.upload {
            return sender
                .send(Ok(chunk))
                .await
                .map_err(|_| FetchError::network(self.url.as_str(), "upload channel closed"));
        }
        self.body.extend_from_slice(&chunk);
        if self.body.len() > BUFFERED_BODY_LIMIT {
            self.start_streaming_upload().await?;
        }
        Ok(())
    }

    async fn end(&mut self) -> Result<(), FetchError> {
        if self.upload.take().is_some() || self.pending.is_some() {
            return Ok(());
        }
        self.sent_body = std::mem::take(&mut self.body).freeze();
        let mut request = self.request_builder();
        if !self.sent_body.is_empty() {
            request = request.body(self.sent_body.clone());
        }
        self.dispatch(request);
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn next_event(&mut self) -> TransportEvent {
        if self.aborted.is_cancelled() {
            return TransportEvent::Aborted;
        }
        if let Some(message) = self.failure.take() {
            return TransportEvent::Error(message);
        }
        let Some(handle) = self.pending.take() else {
            return TransportEvent::Error("request was not dispatched".to_string());
        };

        let abort_handle = handle.abort_handle();
        let joined = tokio::select! {
            () = self.aborted.cancelled() => {
                abort_handle.abort();
                return TransportEvent::Aborted;
            }
            joined = handle => joined,
        };

        let response = match joined {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => return TransportEvent::Error(describe(&error)),
            Err(error) if error.is_cancelled() => return TransportEvent::Aborted,
            Err(error) => return TransportEvent::Error(error.to_string()),
        };

        if let Some(challenge) = self.challenge_for(&response) {
            self.challenged = true;
            self.challenge_is_proxy = challenge.is_proxy;
            return TransportEvent::Login(challenge);
        }
        self.response_event(response)
    }

    fn authenticate(&mut self, credentials: &Credentials) {
        if self.streamed {
            warn!(url = %self.url, "cannot resend a streamed body for authentication");
            self.failure =
                Some("request body was streamed and cannot be resent for authentication".to_string());
            return;
        }

        let mut request = self.request_builder();
        if self.challenge_is_proxy {
            let token = STANDARD.encode(format!("{}:{}", credentials.username, credentials.password));
            request = request.header(PROXY_AUTHORIZATION, format!("Basic {token}"));
        } else {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if !self.sent_body.is_empty() {
            request = request.body(self.sent_body.clone());
        }
        self.dispatch(request);
    }

    fn abort(&mut self) {
        if self.aborted.is_cancelled() {
            return;
        }
        debug!(url = %self.url, "aborting request");
        self.aborted.cancel();
        self.upload = None;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for ReqwestRequest {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn build_client(config: &ClientConfig, jar: Option<Arc<Jar>>) -> Result<Client, reqwest::Error> {
    let guarded = catch_unwind_silent(AssertUnwindSafe(|| {
        base_client_builder(config, jar.clone()).build()
    }));
    match guarded {
        Ok(result) => result,
        Err(_) => {
            warn!(
                "HTTP client builder panicked while loading system proxy settings; retrying without system proxies"
            );
            base_client_builder(config, jar).no_proxy().build()
        }
    }
}

// `catch_unwind` does not suppress panic-hook stderr output, so the hook is
// silenced while a guarded build runs.
static CLIENT_BUILD_PANIC_HOOK_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn catch_unwind_silent<F, T>(operation: F) -> Result<T, Box<dyn std::any::Any + Send + 'static>>
where
    F: FnOnce() -> T + std::panic::UnwindSafe,
{
    let _panic_hook_guard = CLIENT_BUILD_PANIC_HOOK_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let previous_hook = take_hook();
    set_hook(Box::new(|_| {}));
    let outcome = catch_unwind(operation);
    set_hook(previous_hook);
    outcome
}

fn base_client_builder(config: &ClientConfig, jar: Option<Arc<Jar>>) -> ClientBuilder {
    let mut builder = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.clone())
        .gzip(config.decompress)
        .deflate(config.decompress)
        .brotli(config.decompress);
    if let Some(jar) = jar {
        builder = builder.cookie_provider(jar);
    }
    builder
}
