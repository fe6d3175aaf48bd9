//! Redirect following.
//!
//! The coordinator is an explicit state machine:
//!
//! ```text
//! Sending ──> (response) ──> Completed
//!    ^            │
//!    │            v
//!    └──────  Redirecting
//! ```
//!
//! Any failure short-circuits to the caller. Hops run strictly one after
//! another and are bounded by `max_redirect_count`; cycles are not detected,
//! they simply run into the ceiling.

use tracing::{debug, instrument, warn};
use url::Url;

use crate::constants::REDIRECT_STATUSES;
use crate::error::FetchError;
use crate::request::RequestDescriptor;
use crate::response::Response;
use crate::transport::{Exchange, Transport, TransportClient};

enum RedirectState {
    Sending(RequestDescriptor),
    Redirecting {
        descriptor: RequestDescriptor,
        location: Url,
        rewrite_to_get: bool,
    },
    Completed(Response),
}

/// Per-request redirect driver. Owns its hop counter.
pub(crate) struct RedirectCoordinator<'a> {
    transport: &'a dyn Transport,
    redirect_count: u32,
}

impl<'a> RedirectCoordinator<'a> {
    pub(crate) fn new(transport: &'a dyn Transport) -> Self {
        Self {
            transport,
            redirect_count: 0,
        }
    }

    /// Runs the exchange to its terminal response.
    #[instrument(level = "debug", skip_all, fields(method = %descriptor.method(), url = %descriptor.url()))]
    pub(crate) async fn run(mut self, descriptor: RequestDescriptor) -> Result<Response, FetchError> {
        let mut state = RedirectState::Sending(descriptor);
        loop {
            state = match state {
                RedirectState::Sending(descriptor) => self.send(descriptor).await?,
                RedirectState::Redirecting {
                    descriptor,
                    location,
                    rewrite_to_get,
                } => {
                    self.redirect_count += 1;
                    RedirectState::Sending(descriptor.next_hop(location, rewrite_to_get)?)
                }
                RedirectState::Completed(response) => return Ok(response),
            };
        }
    }

    async fn send(&self, descriptor: RequestDescriptor) -> Result<RedirectState, FetchError> {
        let (descriptor, body) = descriptor.detach_body();
        let mut exchange = TransportClient::new(self.transport)
            .execute(&descriptor, body)
            .await?;

        let status = exchange.response.status;
        if !descriptor.follow_redirect() || !REDIRECT_STATUSES.contains(&status) {
            return Ok(RedirectState::Completed(self.complete(exchange, &descriptor)));
        }

        // The redirect response body is never read.
        exchange.request.abort();
        let url = descriptor.url().as_str();

        if self.redirect_count >= descriptor.max_redirect_count() {
            warn!(url, max = descriptor.max_redirect_count(), "redirect ceiling reached");
            return Err(FetchError::MaxRedirectsExceeded {
                url: url.to_string(),
                max: descriptor.max_redirect_count(),
            });
        }

        let Some(location) = exchange.response.headers.get("location") else {
            return Err(FetchError::MissingLocationHeader {
                url: url.to_string(),
            });
        };

        let rewrite_to_get =
            status == 303 || (matches!(status, 301 | 302) && descriptor.method() == "POST");
        let location = resolve_location(descriptor.url(), &location)?;

        debug!(
            status,
            from = url,
            to = %location,
            hop = self.redirect_count + 1,
            rewrite_to_get,
            "following redirect"
        );
        Ok(RedirectState::Redirecting {
            descriptor,
            location,
            rewrite_to_get,
        })
    }

    fn complete(&self, exchange: Exchange, descriptor: &RequestDescriptor) -> Response {
        Response::new(
            exchange,
            descriptor.url().clone(),
            self.redirect_count,
            descriptor.max_body_bytes(),
            descriptor.cancel_token(),
        )
    }
}

fn resolve_location(current: &Url, location: &str) -> Result<Url, FetchError> {
    let next = current
        .join(location)
        .map_err(|e| FetchError::invalid_url(location, e.to_string()))?;
    if !matches!(next.scheme(), "http" | "https") {
        return Err(FetchError::UnsupportedProtocol {
            scheme: next.scheme().to_string(),
        });
    }
    Ok(next)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::request::{RequestBody, RequestOptions};
    use crate::test_support::scripted::{Script, ScriptedTransport};
    use bytes::Bytes;

    const START: &str = "http://scripted.test/start";

    async fn run(transport: &ScriptedTransport, options: RequestOptions) -> Result<Response, FetchError> {
        let descriptor = options.build(START).unwrap();
        RedirectCoordinator::new(transport).run(descriptor).await
    }

    #[tokio::test]
    async fn test_post_302_becomes_get_without_body() {
        let transport = ScriptedTransport::new(vec![
            Script::redirect(302, "/next"),
            Script::ok(200, "landed"),
        ]);
        let mut response = run(
            &transport,
            RequestOptions::new().method("POST").body("payload"),
        )
        .await
        .unwrap();

        assert_eq!(response.text().await.unwrap(), "landed");
        assert_eq!(response.redirect_count(), 1);
        assert_eq!(response.url().as_str(), "http://scripted.test/next");

        let follow_up = transport.attempt(1);
        assert_eq!(follow_up.method, "GET");
        assert!(follow_up.body.is_empty());
        assert_eq!(follow_up.header("content-length"), None);
        assert!(transport.attempt(0).aborted);
    }

    #[tokio::test]
    async fn test_307_preserves_method_and_body() {
        let transport = ScriptedTransport::new(vec![
            Script::redirect(307, "http://other.test/target"),
            Script::ok(201, ""),
        ]);
        let response = run(
            &transport,
            RequestOptions::new()
                .method("POST")
                .header("Content-Type", "application/json")
                .body(r#"{"k":1}"#),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), 201);

        let follow_up = transport.attempt(1);
        assert_eq!(follow_up.method, "POST");
        assert_eq!(follow_up.url, "http://other.test/target");
        assert_eq!(follow_up.body, br#"{"k":1}"#);
        assert_eq!(follow_up.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_303_rewrites_any_method_to_get() {
        let transport = ScriptedTransport::new(vec![
            Script::redirect(303, "/see-other"),
            Script::ok(200, ""),
        ]);
        run(&transport, RequestOptions::new().method("PUT").body("x"))
            .await
            .unwrap();
        assert_eq!(transport.attempt(1).method, "GET");
        assert!(transport.attempt(1).body.is_empty());
    }

    #[tokio::test]
    async fn test_301_preserves_non_post_method() {
        let transport = ScriptedTransport::new(vec![
            Script::redirect(301, "/moved"),
            Script::ok(200, ""),
        ]);
        run(&transport, RequestOptions::new().method("DELETE"))
            .await
            .unwrap();
        assert_eq!(transport.attempt(1).method, "DELETE");
    }

    #[tokio::test]
    async fn test_post_301_becomes_get_without_body() {
        let transport = ScriptedTransport::new(vec![
            Script::redirect(301, "/moved"),
            Script::ok(200, ""),
        ]);
        run(&transport, RequestOptions::new().method("POST").body("form=1"))
            .await
            .unwrap();

        let follow_up = transport.attempt(1);
        assert_eq!(follow_up.method, "GET");
        assert!(follow_up.body.is_empty());
        assert_eq!(follow_up.header("content-length"), None);
    }

    #[tokio::test]
    async fn test_308_preserves_method_and_body() {
        let transport = ScriptedTransport::new(vec![
            Script::redirect(308, "/permanent"),
            Script::ok(200, ""),
        ]);
        let response = run(&transport, RequestOptions::new().method("POST").body("form=1"))
            .await
            .unwrap();
        assert_eq!(response.redirect_count(), 1);

        let follow_up = transport.attempt(1);
        assert_eq!(follow_up.method, "POST");
        assert_eq!(follow_up.url, "http://scripted.test/permanent");
        assert_eq!(follow_up.body, b"form=1");
        assert_eq!(follow_up.header("content-type"), Some("text/plain;charset=UTF-8"));
    }

    #[tokio::test]
    async fn test_zero_max_redirects_fails_on_first_redirect() {
        let transport = ScriptedTransport::new(vec![Script::redirect(302, "/loop")]);
        let err = run(&transport, RequestOptions::new().max_redirect_count(0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Redirect);
        assert_eq!(err.code(), "ERR_MAX_REDIRECTS_EXCEEDED");
        assert_eq!(transport.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_redirect_cycle_bounded_by_ceiling() {
        let scripts = (0..4).map(|_| Script::redirect(302, "/start")).collect();
        let transport = ScriptedTransport::new(scripts);
        let err = run(&transport, RequestOptions::new().max_redirect_count(3))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ERR_MAX_REDIRECTS_EXCEEDED");
        assert_eq!(transport.attempt_count(), 4);
    }

    #[tokio::test]
    async fn test_missing_location_fails() {
        let transport = ScriptedTransport::new(vec![Script::ok(302, "")]);
        let err = run(&transport, RequestOptions::new()).await.unwrap_err();
        assert_eq!(err.code(), "ERR_MISSING_LOCATION_HEADER");
    }

    #[tokio::test]
    async fn test_follow_redirect_disabled_returns_3xx() {
        let transport = ScriptedTransport::new(vec![Script::redirect(301, "/elsewhere")]);
        let response = run(&transport, RequestOptions::new().follow_redirect(false))
            .await
            .unwrap();
        assert_eq!(response.status(), 301);
        assert_eq!(response.headers().get("location").as_deref(), Some("/elsewhere"));
        assert_eq!(response.redirect_count(), 0);
    }

    #[tokio::test]
    async fn test_streamed_body_cannot_be_replayed() {
        let transport = ScriptedTransport::new(vec![
            Script::redirect(307, "/again"),
            Script::ok(200, ""),
        ]);
        let stream = futures_util::stream::iter(vec![Ok(Bytes::from_static(b"chunk"))]);
        let err = run(
            &transport,
            RequestOptions::new()
                .method("POST")
                .body(RequestBody::stream(stream)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "ERR_BODY_NOT_REPLAYABLE");
        assert_eq!(transport.attempt(0).body, b"chunk");
    }

    #[tokio::test]
    async fn test_streamed_body_dropped_on_rewrite() {
        let transport = ScriptedTransport::new(vec![
            Script::redirect(303, "/done"),
            Script::ok(200, ""),
        ]);
        let stream = futures_util::stream::iter(vec![Ok(Bytes::from_static(b"chunk"))]);
        run(
            &transport,
            RequestOptions::new()
                .method("POST")
                .body(RequestBody::stream(stream)),
        )
        .await
        .unwrap();
        assert!(transport.attempt(1).body.is_empty());
    }

    #[tokio::test]
    async fn test_redirect_to_unsupported_scheme_fails() {
        let transport = ScriptedTransport::new(vec![Script::redirect(302, "ftp://files.test/x")]);
        let err = run(&transport, RequestOptions::new()).await.unwrap_err();
        assert_eq!(err.code(), "ERR_UNSUPPORTED_PROTOCOL");
    }
}
