//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Adds X-Request-Id header
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Access Log     │ ← One span per request, level by status
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │    Security      │ ← 500 bad host, 301/307 HTTPS redirect, headers
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Authentication  │ ← 401 if X-MptcpKit-Auth is missing or wrong
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Body Limit     │ ← 413 above api.max_request_body_size
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! # Routes
//!
//! - `GET /ip` - caller address
//! - `POST /wan/update` - run the `wan-update` script
//! - `GET /ss/key` - current service key
//! - `GET /ping` - liveness

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{AccessLog, ApiKeyAuth, RequestIdLayer, SecurityLayer, SecurityPolicy};
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let trust_proxy_headers = config.server.trust_proxy_headers;

    let mut router = Router::new()
        .route("/ip", get(handlers::client_ip))
        .route("/wan/update", post(handlers::wan_update))
        .route("/ss/key", get(handlers::service_key))
        .route("/ping", get(handlers::ping));

    // Applied bottom to top: the last layer sees the request first

    info!(
        max_bytes = config.api.max_request_body_size,
        "Request body size limit configured"
    );
    router = router.layer(DefaultBodyLimit::max(config.api.max_request_body_size));

    router = router.layer(ApiKeyAuth::new(
        state.credentials.api_key(),
        trust_proxy_headers,
    ));

    info!(
        allowed_hosts = ?config.security.allowed_hosts,
        ssl_redirect = config.security.ssl_redirect,
        "Security policy configured"
    );
    router = router.layer(SecurityLayer::new(SecurityPolicy::new(
        &config.security,
        config.server.https,
        trust_proxy_headers,
    )));

    let access_log = AccessLog::new(trust_proxy_headers);
    router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(access_log)
            .on_response(access_log),
    );

    router = router.layer(RequestIdLayer::new());

    router.with_state(state)
}
