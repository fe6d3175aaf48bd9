//! In-memory transport that replays scripted outcomes, one per attempt.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::headers::HeaderTable;
use crate::request::{Credentials, RequestDescriptor};
use crate::transport::{AuthChallenge, RawResponse, Transport, TransportEvent, TransportRequest};

/// What one attempt observed.
#[derive(Debug, Clone, Default)]
pub struct AttemptRecord {
    pub method: String,
    pub url: String,
    pub header_lines: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub ended: bool,
    pub aborted: bool,
    pub authenticated_as: Option<String>,
}

impl AttemptRecord {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_lines
            .iter()
            .find(|(line_name, _)| line_name == name)
            .map(|(_, value)| value.as_str())
    }
}

enum Outcome {
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        chunks: Vec<Bytes>,
        fail_with: Option<String>,
    },
    Error(String),
    Login(String),
    Hang,
}

/// Outcome of one scripted attempt.
pub struct Script {
    outcome: Outcome,
    delay: Option<Duration>,
    after_login: Option<Box<Script>>,
}

impl Script {
    fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            delay: None,
            after_login: None,
        }
    }

    pub fn ok(status: u16, body: &str) -> Self {
        let chunks = if body.is_empty() {
            Vec::new()
        } else {
            vec![Bytes::copy_from_slice(body.as_bytes())]
        };
        Self::chunked(status, chunks)
    }

    pub fn chunked(status: u16, chunks: Vec<Bytes>) -> Self {
        Self::new(Outcome::Respond {
            status,
            headers: Vec::new(),
            chunks,
            fail_with: None,
        })
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Self::ok(status, "").with_header("location", location)
    }

    pub fn error(message: &str) -> Self {
        Self::new(Outcome::Error(message.to_string()))
    }

    pub fn login(host: &str) -> Self {
        Self::new(Outcome::Login(host.to_string()))
    }

    pub fn hang() -> Self {
        Self::new(Outcome::Hang)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Outcome::Respond { headers, .. } = &mut self.outcome {
            headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// Ends the body with a stream error after the scripted chunks.
    pub fn failing_body(mut self, message: &str) -> Self {
        if let Outcome::Respond { fail_with, .. } = &mut self.outcome {
            *fail_with = Some(message.to_string());
        }
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Response replayed after the login challenge is answered.
    pub fn then_ok(mut self, status: u16, body: &str) -> Self {
        self.after_login = Some(Box::new(Self::ok(status, body)));
        self
    }
}

/// Transport handing out one [`Script`] per `open`.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    attempts: Mutex<Vec<Arc<Mutex<AttemptRecord>>>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempt(&self, index: usize) -> AttemptRecord {
        self.attempts.lock().unwrap()[index].lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, descriptor: &RequestDescriptor) -> Result<Box<dyn TransportRequest>, FetchError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| FetchError::network(descriptor.url().as_str(), "no scripted outcome left"))?;
        let record = Arc::new(Mutex::new(AttemptRecord {
            method: descriptor.method().to_string(),
            url: descriptor.url().to_string(),
            ..AttemptRecord::default()
        }));
        self.attempts.lock().unwrap().push(Arc::clone(&record));
        Ok(Box::new(ScriptedRequest {
            script: Some(script),
            record,
            aborted: CancellationToken::new(),
        }))
    }
}

struct ScriptedRequest {
    script: Option<Script>,
    record: Arc<Mutex<AttemptRecord>>,
    aborted: CancellationToken,
}

#[async_trait]
impl TransportRequest for ScriptedRequest {
    fn set_header(&mut self, name: &str, value: &str) -> Result<(), FetchError> {
        self.record
            .lock()
            .unwrap()
            .header_lines
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), FetchError> {
        self.record.lock().unwrap().body.extend_from_slice(&chunk);
        Ok(())
    }

    async fn end(&mut self) -> Result<(), FetchError> {
        self.record.lock().unwrap().ended = true;
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        if self.aborted.is_cancelled() {
            return TransportEvent::Aborted;
        }
        let Some(script) = self.script.take() else {
            return TransportEvent::Error("script exhausted".to_string());
        };
        if let Some(delay) = script.delay {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.aborted.cancelled() => return TransportEvent::Aborted,
            }
        }

        match script.outcome {
            Outcome::Hang => {
                self.aborted.cancelled().await;
                TransportEvent::Aborted
            }
            Outcome::Error(message) => TransportEvent::Error(message),
            Outcome::Login(host) => {
                self.script = script.after_login.map(|next| *next);
                TransportEvent::Login(AuthChallenge::parse(&host, None, "Basic realm=\"test\"", false))
            }
            Outcome::Respond {
                status,
                headers,
                chunks,
                fail_with,
            } => {
                let headers = HeaderTable::from_pairs(headers).unwrap();
                let mut items: Vec<Result<Bytes, io::Error>> = chunks.into_iter().map(Ok).collect();
                if let Some(message) = fail_with {
                    items.push(Err(io::Error::other(message)));
                }
                let body = futures_util::stream::iter(items)
                    .take_until(self.aborted.clone().cancelled_owned());
                TransportEvent::Response(RawResponse {
                    status,
                    headers,
                    body: Box::pin(body),
                })
            }
        }
    }

    fn authenticate(&mut self, credentials: &Credentials) {
        self.record.lock().unwrap().authenticated_as = Some(credentials.username.clone());
    }

    fn abort(&mut self) {
        self.record.lock().unwrap().aborted = true;
        self.aborted.cancel();
    }
}
