//! Netfetch Core Library
//!
//! A fetch-style HTTP engine layered on a low-level streaming request
//! primitive. Callers describe a request with [`RequestOptions`], send it
//! through a [`Client`], and consume the terminal [`Response`] once: as bytes,
//! text, JSON, a [`Blob`], a raw chunk stream, or piped into a sink with
//! optional progress reporting and checksum validation.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`headers`] - Case-insensitive header table with HTTP grammar validation
//! - [`request`] - Request options, validation, and the immutable descriptor
//! - [`transport`] - Streaming request primitive and its reqwest backend
//! - [`response`] - Single-use response body and its decoders
//! - [`transform`] - Digest and progress stream stages
//! - [`session`] - Named cookie partitions
//!
//! Redirects are followed by an internal state machine between the client and
//! the transport.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod blob;
pub mod client;
pub mod constants;
mod download;
pub mod error;
pub mod headers;
mod redirect;
pub mod request;
pub mod response;
pub mod session;
pub mod transform;
pub mod transport;

#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use blob::Blob;
pub use client::{Client, send};
pub use download::download;
pub use error::{ErrorKind, FetchError};
pub use headers::{HeaderEntry, HeaderTable};
pub use request::{Credentials, RequestBody, RequestDescriptor, RequestOptions};
pub use response::{BodyStream, Response, TextEncoding};
pub use session::SessionContext;
pub use transform::{
    DigestAlgorithm, DigestEncoding, DigestValidator, ProgressCallback, ProgressInfo,
    ValidateOptions,
};
pub use transport::{
    AuthChallenge, ByteStream, ClientConfig, RawResponse, ReqwestTransport, Transport,
    TransportEvent, TransportRequest,
};
