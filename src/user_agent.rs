//! Default User-Agent for outgoing requests.

/// Default User-Agent, applied when the caller does not set one.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("netfetch/{version} (rust; {})", std::env::consts::OS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_crate_version() {
        let ua = default_user_agent();
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("netfetch/")
                .and_then(|s| s.split(' ').next())
                .unwrap_or_default(),
            "UA must contain crate version: {ua}"
        );
        assert!(ua.contains(std::env::consts::OS));
    }
}
