//! Static API key authentication gate.
//!
//! Every request must carry the key from `keys.api` in the
//! `X-MptcpKit-Auth` header:
//!
//! ```bash
//! curl -H "X-MptcpKit-Auth: $KEY" https://gateway:8080/ping
//! ```
//!
//! There are no bypass paths; liveness checks authenticate too. A missing or
//! wrong key is answered with 401 before routing, so unknown paths are
//! indistinguishable from known ones to unauthenticated callers.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use axum::response::IntoResponse;
use subtle::ConstantTimeEq;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::ip::extract_client_ip;
use crate::metrics;

/// Header carrying the API key.
pub const AUTH_HEADER: &str = "x-mptcpkit-auth";

const UNAUTHORIZED_BODY: &str = r#"{"error":"unauthorized","message":"Unauthorized Access"}"#;

/// API key authentication layer.
#[derive(Clone)]
pub struct ApiKeyAuth {
    expected_key: Arc<str>,
    trust_proxy_headers: bool,
}

impl ApiKeyAuth {
    /// `api_key` must be non-empty; the credential loader rejects empty keys
    /// at startup.
    pub fn new(api_key: &str, trust_proxy_headers: bool) -> Self {
        Self {
            expected_key: Arc::from(api_key),
            trust_proxy_headers,
        }
    }
}

impl<S> Layer<S> for ApiKeyAuth {
    type Service = ApiKeyAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiKeyAuthService {
            inner,
            expected_key: self.expected_key.clone(),
            trust_proxy_headers: self.trust_proxy_headers,
        }
    }
}

#[derive(Clone)]
pub struct ApiKeyAuthService<S> {
    inner: S,
    expected_key: Arc<str>,
    trust_proxy_headers: bool,
}

impl<S> Service<Request<Body>> for ApiKeyAuthService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let expected = self.expected_key.clone();
        let trust_proxy_headers = self.trust_proxy_headers;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let provided = req
                .headers()
                .get(AUTH_HEADER)
                .and_then(|v| v.to_str().ok());

            match provided {
                Some(key) if constant_time_eq(key, &expected) => {
                    debug!("API key authentication successful");
                    inner.call(req).await
                }
                Some(_) => {
                    metrics::record_auth_failure("invalid");
                    warn!(
                        path = %req.uri().path(),
                        client_ip = %extract_client_ip(&req, trust_proxy_headers),
                        "Invalid API key provided"
                    );
                    Ok(unauthorized_response())
                }
                None => {
                    metrics::record_auth_failure("missing");
                    warn!(
                        path = %req.uri().path(),
                        client_ip = %extract_client_ip(&req, trust_proxy_headers),
                        "Missing API key"
                    );
                    Ok(unauthorized_response())
                }
            }
        })
    }
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response() -> Response<Body> {
    (
        StatusCode::UNAUTHORIZED,
        [(header::CONTENT_TYPE, "application/json")],
        UNAUTHORIZED_BODY,
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::routing::get;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    fn app(hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/ping",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        "pong"
                    }
                }),
            )
            .layer(ApiKeyAuth::new("secret", true))
    }

    async fn send(app: Router, key: Option<&str>, path: &str) -> Response<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(key) = key {
            builder = builder.header("X-MptcpKit-Auth", key);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_key_passes() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = send(app(hits.clone()), Some("secret"), "/ping").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_key_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = send(app(hits.clone()), None, "/ping").await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrong_key_rejected_without_leaking() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = send(app(hits.clone()), Some("secreT"), "/ping").await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(!body.contains("secret"));
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_unknown_path_requires_auth() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = send(app(hits.clone()), None, "/nope").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(app(hits), Some("secret"), "/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret123", "secret123"));
        assert!(!constant_time_eq("secret123", "secret456"));
        assert!(!constant_time_eq("short", "much-longer-string"));
        assert!(!constant_time_eq("", "secret"));
    }
}
