//! Streaming checksum validation.
//!
//! [`DigestStream`] forwards every chunk unchanged while feeding it to a
//! [`DigestValidator`]. When the upstream ends the digest is finalized and,
//! unless `validate_on_end` is off, compared to the expected value.

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use bytes::Bytes;
use futures_util::Stream;
use sha2::Digest as _;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::headers::grammar::from_latin1;

/// Hash algorithm applied to the streamed bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// MD5 (default).
    #[default]
    Md5,
    /// SHA-1.
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl DigestAlgorithm {
    /// Lower-case algorithm name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(FetchError::UnsupportedDigest {
                name: s.to_string(),
            }),
        }
    }
}

/// Text encoding of the finalized digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DigestEncoding {
    /// Standard base64 with padding (default).
    #[default]
    Base64,
    /// URL-safe base64 without padding.
    Base64Url,
    /// Lower-case hex.
    Hex,
    /// One char per byte (`binary`).
    Latin1,
}

impl DigestEncoding {
    fn encode(self, digest: &[u8]) -> String {
        match self {
            Self::Base64 => STANDARD.encode(digest),
            Self::Base64Url => URL_SAFE_NO_PAD.encode(digest),
            Self::Hex => hex::encode(digest),
            Self::Latin1 => from_latin1(digest),
        }
    }
}

impl FromStr for DigestEncoding {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base64" => Ok(Self::Base64),
            "base64url" => Ok(Self::Base64Url),
            "hex" => Ok(Self::Hex),
            "latin1" | "binary" => Ok(Self::Latin1),
            _ => Err(FetchError::UnsupportedDigest {
                name: s.to_string(),
            }),
        }
    }
}

/// Expected checksum and how to compute it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Expected digest, in `encoding`.
    pub expected: String,
    /// Hash algorithm.
    pub algorithm: DigestAlgorithm,
    /// Digest encoding.
    pub encoding: DigestEncoding,
    /// Compare automatically when the stream ends.
    pub validate_on_end: bool,
}

impl ValidateOptions {
    /// md5/base64 validation against `expected`, checked on stream end.
    #[must_use]
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            algorithm: DigestAlgorithm::default(),
            encoding: DigestEncoding::default(),
            validate_on_end: true,
        }
    }

    /// Sets the algorithm.
    #[must_use]
    pub fn algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the encoding.
    #[must_use]
    pub fn encoding(mut self, encoding: DigestEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Enables or disables the comparison on stream end.
    #[must_use]
    pub fn validate_on_end(mut self, enabled: bool) -> Self {
        self.validate_on_end = enabled;
        self
    }
}

enum Hasher {
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
}

impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Self::Md5(md5::Md5::new()),
            DigestAlgorithm::Sha1 => Self::Sha1(sha1::Sha1::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            DigestAlgorithm::Sha384 => Self::Sha384(sha2::Sha384::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(sha2::Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Md5(h) => h.finalize().to_vec(),
            Self::Sha1(h) => h.finalize().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha384(h) => h.finalize().to_vec(),
            Self::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// Incremental hash over a byte stream plus its expected value.
pub struct DigestValidator {
    options: ValidateOptions,
    hasher: Option<Hasher>,
    actual: Option<String>,
}

impl DigestValidator {
    /// Creates a validator with an empty accumulator.
    #[must_use]
    pub fn new(options: ValidateOptions) -> Self {
        let hasher = Hasher::new(options.algorithm);
        Self {
            options,
            hasher: Some(hasher),
            actual: None,
        }
    }

    /// Feeds `chunk` into the running hash. Ignored once finished.
    pub fn update(&mut self, chunk: &[u8]) {
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(chunk);
        }
    }

    /// Finalizes the digest and, if `validate_on_end` is set, validates it.
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` when validating and the digests differ.
    pub fn finish(&mut self) -> Result<(), FetchError> {
        if let Some(hasher) = self.hasher.take() {
            let actual = self.options.encoding.encode(&hasher.finalize());
            debug!(algorithm = %self.options.algorithm, actual = %actual, "digest finalized");
            self.actual = Some(actual);
        }
        if self.options.validate_on_end {
            self.validate()
        } else {
            Ok(())
        }
    }

    /// Compares the finalized digest with the expected value.
    ///
    /// # Errors
    ///
    /// - `NotFinished` before [`finish`](Self::finish) has run
    /// - `ChecksumMismatch` when the digests differ
    pub fn validate(&self) -> Result<(), FetchError> {
        let Some(actual) = self.actual.as_deref() else {
            return Err(FetchError::NotFinished);
        };
        if actual == self.options.expected {
            return Ok(());
        }
        warn!(
            algorithm = %self.options.algorithm,
            expected = %self.options.expected,
            actual,
            "checksum mismatch"
        );
        Err(FetchError::ChecksumMismatch {
            algorithm: self.options.algorithm.to_string(),
            expected: self.options.expected.clone(),
            actual: actual.to_string(),
        })
    }

    /// Finalized digest, once the stream has ended.
    #[must_use]
    pub fn actual(&self) -> Option<&str> {
        self.actual.as_deref()
    }
}

impl fmt::Debug for DigestValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestValidator")
            .field("options", &self.options)
            .field("actual", &self.actual)
            .finish_non_exhaustive()
    }
}

/// Pass-through stream that hashes every chunk it forwards.
pub struct DigestStream<S> {
    inner: S,
    validator: DigestValidator,
    done: bool,
}

impl<S> DigestStream<S> {
    /// Wraps `inner`.
    pub fn new(inner: S, validator: DigestValidator) -> Self {
        Self {
            inner,
            validator,
            done: false,
        }
    }

    /// The validator, e.g. to call [`DigestValidator::validate`] after the stream.
    pub fn validator(&self) -> &DigestValidator {
        &self.validator
    }
}

impl<S> Stream for DigestStream<S>
where
    S: Stream<Item = Result<Bytes, FetchError>> + Unpin,
{
    type Item = Result<Bytes, FetchError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.validator.update(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                this.done = true;
                match this.validator.finish() {
                    Ok(()) => Poll::Ready(None),
                    Err(error) => Poll::Ready(Some(Err(error))),
                }
            }
            other => other,
        }
    }
}
