//! Validated, case-insensitive, optionally multi-valued header table.
//!
//! [`HeaderTable`] stores entries in a [`reqwest::header::HeaderMap`] after
//! checking names against the HTTP token grammar and values against the
//! control-byte blacklist in [`grammar`]. Names are lower-cased on insert, so
//! every lookup is case-insensitive.
//!
//! # Example
//!
//! ```
//! use netfetch::HeaderTable;
//!
//! let mut headers = HeaderTable::new();
//! headers.set("Valid-Name", "ok").unwrap();
//! headers.append("accept", "text/html").unwrap();
//! headers.append("Accept", "application/json").unwrap();
//!
//! assert_eq!(headers.get("valid-name").as_deref(), Some("ok"));
//! assert_eq!(headers.get("ACCEPT").as_deref(), Some("text/html,application/json"));
//! assert!(headers.set("X-Test", "a\x01b").is_err());
//! ```

pub mod grammar;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::FetchError;

use self::grammar::{from_latin1, has_invalid_value_char, is_http_token, to_latin1};

/// Value stored under one header name: a single string or an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderEntry {
    /// One value.
    Single(String),
    /// Several values, in insertion order.
    Multiple(Vec<String>),
}

impl HeaderEntry {
    /// Returns the values as a slice-like vector.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Joins the values with a comma, as `get` reports them.
    #[must_use]
    pub fn joined(&self) -> String {
        self.values().join(",")
    }
}

impl From<&str> for HeaderEntry {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for HeaderEntry {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for HeaderEntry {
    fn from(values: Vec<String>) -> Self {
        Self::Multiple(values)
    }
}

impl From<&[&str]> for HeaderEntry {
    fn from(values: &[&str]) -> Self {
        Self::Multiple(values.iter().map(|v| (*v).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for HeaderEntry {
    fn from(values: [&str; N]) -> Self {
        Self::Multiple(values.iter().map(|v| (*v).to_string()).collect())
    }
}

/// Validated header map with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTable {
    map: HeaderMap,
}

impl HeaderTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(name, value)` pairs, appending repeated names.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeaderName` / `InvalidHeaderValue` for the first pair
    /// that fails validation.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, FetchError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut table = Self::new();
        for (name, value) in pairs {
            table.append(name.as_ref(), value.as_ref())?;
        }
        Ok(table)
    }

    /// Replaces any existing values for `name` with `value`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeaderName` if `name` is not an HTTP token, or
    /// `InvalidHeaderValue` if any value contains a forbidden character.
    pub fn set(&mut self, name: &str, value: impl Into<HeaderEntry>) -> Result<(), FetchError> {
        let header_name = sanitize_name(name)?;
        let values = match value.into() {
            HeaderEntry::Single(value) => vec![sanitize_value(name, &value)?],
            HeaderEntry::Multiple(values) => values
                .iter()
                .map(|value| sanitize_value(name, value))
                .collect::<Result<Vec<_>, _>>()?,
        };

        self.map.remove(&header_name);
        for value in values {
            self.map.append(header_name.clone(), value);
        }
        Ok(())
    }

    /// Adds `value` to `name`, coalescing into a sequence if the name exists.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn append(&mut self, name: &str, value: &str) -> Result<(), FetchError> {
        let header_name = sanitize_name(name)?;
        let header_value = sanitize_value(name, value)?;
        self.map.append(header_name, header_value);
        Ok(())
    }

    /// Returns the value for `name`, with multiple values joined by a comma.
    ///
    /// Names that are not valid tokens are never present, so they yield `None`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.entry(name).map(|entry| entry.joined())
    }

    /// Returns every value stored for `name`, in insertion order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<String> {
        let Ok(header_name) = sanitize_name(name) else {
            return Vec::new();
        };
        self.map
            .get_all(&header_name)
            .iter()
            .map(|value| from_latin1(value.as_bytes()))
            .collect()
    }

    /// Returns the stored entry for `name`.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<HeaderEntry> {
        let mut values = self.get_all(name);
        match values.len() {
            0 => None,
            1 => values.pop().map(HeaderEntry::Single),
            _ => Some(HeaderEntry::Multiple(values)),
        }
    }

    /// Returns true if `name` has at least one value.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        sanitize_name(name).is_ok_and(|header_name| self.map.contains_key(&header_name))
    }

    /// Removes every value for `name`. Returns true if anything was removed.
    pub fn delete(&mut self, name: &str) -> bool {
        let Ok(header_name) = sanitize_name(name) else {
            return false;
        };
        self.map.remove(&header_name).is_some()
    }

    /// Returns the full table, one entry per lower-cased name.
    #[must_use]
    pub fn raw(&self) -> Vec<(String, HeaderEntry)> {
        self.map
            .keys()
            .filter_map(|key| {
                self.entry(key.as_str())
                    .map(|entry| (key.as_str().to_string(), entry))
            })
            .collect()
    }

    /// Iterates one `(name, value)` line per value, expanding multi-valued entries.
    pub fn lines(&self) -> impl Iterator<Item = (&str, String)> {
        self.map
            .iter()
            .map(|(name, value)| (name.as_str(), from_latin1(value.as_bytes())))
    }

    /// Parses the `content-length` header, if present and numeric.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.get("content-length")
            .and_then(|value| value.trim().parse::<u64>().ok())
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.keys_len()
    }

    /// Returns true if the table holds no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the validated headers as a reqwest header map.
    #[must_use]
    pub fn as_header_map(&self) -> &HeaderMap {
        &self.map
    }
}

impl TryFrom<&HeaderMap> for HeaderTable {
    type Error = FetchError;

    fn try_from(map: &HeaderMap) -> Result<Self, Self::Error> {
        let mut table = Self::new();
        for (name, value) in map {
            table.append(name.as_str(), &from_latin1(value.as_bytes()))?;
        }
        Ok(table)
    }
}

fn sanitize_name(name: &str) -> Result<HeaderName, FetchError> {
    if !is_http_token(name) {
        return Err(FetchError::invalid_header_name(name));
    }
    HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
        .map_err(|_| FetchError::invalid_header_name(name))
}

fn sanitize_value(name: &str, value: &str) -> Result<HeaderValue, FetchError> {
    if has_invalid_value_char(value) {
        return Err(FetchError::invalid_header_value(name, value));
    }
    HeaderValue::from_bytes(&to_latin1(value))
        .map_err(|_| FetchError::invalid_header_value(name, value))
}
