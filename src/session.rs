//! Session partitions scoping cookies for outgoing requests.
//!
//! A [`SessionContext`] is an opaque handle: the engine only passes it to the
//! transport, which attaches the session's cookie jar. Partitions are
//! process-wide, so two handles obtained for the same partition name share one
//! jar.

use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use reqwest::cookie::Jar;
use tracing::debug;

use crate::constants::DEFAULT_PARTITION;

static PARTITIONS: OnceLock<DashMap<String, SessionContext>> = OnceLock::new();

/// Handle to a named cookie partition.
#[derive(Clone)]
pub struct SessionContext {
    partition: Arc<str>,
    cookie_jar: Arc<Jar>,
}

impl SessionContext {
    /// Returns the session for `partition`, creating it on first use.
    #[must_use]
    pub fn from_partition(partition: &str) -> Self {
        let partitions = PARTITIONS.get_or_init(DashMap::new);
        partitions
            .entry(partition.to_string())
            .or_insert_with(|| {
                debug!(partition, "creating session partition");
                Self {
                    partition: Arc::from(partition),
                    cookie_jar: Arc::new(Jar::default()),
                }
            })
            .clone()
    }

    /// Partition name.
    #[must_use]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Cookie jar shared by every request in this partition.
    #[must_use]
    pub fn cookie_jar(&self) -> Arc<Jar> {
        Arc::clone(&self.cookie_jar)
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::from_partition(DEFAULT_PARTITION)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;
    use url::Url;

    #[test]
    fn test_same_partition_shares_cookie_jar() {
        let a = SessionContext::from_partition("test-shared");
        let b = SessionContext::from_partition("test-shared");
        assert!(Arc::ptr_eq(&a.cookie_jar(), &b.cookie_jar()));

        let url = Url::parse("https://example.com/").unwrap();
        a.cookie_jar().add_cookie_str("sid=1", &url);
        assert!(b.cookie_jar().cookies(&url).is_some());
    }

    #[test]
    fn test_distinct_partitions_are_isolated() {
        let a = SessionContext::from_partition("test-a");
        let b = SessionContext::from_partition("test-b");
        assert!(!Arc::ptr_eq(&a.cookie_jar(), &b.cookie_jar()));
        assert_eq!(a.partition(), "test-a");
    }

    #[test]
    fn test_default_uses_default_partition() {
        assert_eq!(SessionContext::default().partition(), DEFAULT_PARTITION);
    }
}
