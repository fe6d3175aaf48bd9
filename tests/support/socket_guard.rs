//! Skips wiremock-backed tests where localhost sockets cannot be bound.
//!
//! Set `NETFETCH_REQUIRE_SOCKET_TESTS=1` to turn a skip into a failure.

use std::net::TcpListener;
use std::panic::Location;
use std::sync::OnceLock;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "NETFETCH_REQUIRE_SOCKET_TESTS";

fn localhost_bindable() -> bool {
    static BINDABLE: OnceLock<bool> = OnceLock::new();
    *BINDABLE.get_or_init(|| TcpListener::bind(("127.0.0.1", 0)).is_ok())
}

fn skips_forbidden() -> bool {
    std::env::var(REQUIRE_ENV)
        .is_ok_and(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Starts a mock server, or returns `None` (after logging why) when sockets are unavailable.
///
/// # Panics
///
/// Panics instead of skipping when `NETFETCH_REQUIRE_SOCKET_TESTS` is set.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let caller = Location::caller();
    async move {
        if localhost_bindable() {
            return Some(MockServer::start().await);
        }
        let message = format!(
            "[socket-bound-test] {}:{} needs a localhost socket",
            caller.file(),
            caller.line()
        );
        assert!(!skips_forbidden(), "{message}; {REQUIRE_ENV} forbids skipping");
        eprintln!("{message}; skipping (set {REQUIRE_ENV}=1 to fail instead)");
        None
    }
}
