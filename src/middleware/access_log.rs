//! Access log hooks for `tower_http::trace::TraceLayer`.
//!
//! One span per request carrying method, path, request id and client ip;
//! one event per response whose level follows the status class:
//! 2xx at info, 3xx and 4xx at warn, 5xx at error.

use std::time::Duration;

use axum::http::{Request, Response};
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::{Span, error, info, info_span, warn};

use super::ip::extract_client_ip;
use super::request_id::RequestIdExt;

#[derive(Debug, Clone, Copy)]
pub struct AccessLog {
    trust_proxy_headers: bool,
}

impl AccessLog {
    pub fn new(trust_proxy_headers: bool) -> Self {
        Self {
            trust_proxy_headers,
        }
    }
}

impl<B> MakeSpan<B> for AccessLog {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = request.request_id().unwrap_or("-"),
            client_ip = %extract_client_ip(request, self.trust_proxy_headers),
        )
    }
}

impl<B> OnResponse<B> for AccessLog {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        let status = response.status().as_u16();
        let latency_ms = latency.as_secs_f64() * 1000.0;

        match response_level(status) {
            ResponseLevel::Info => info!(status, latency_ms, "request completed"),
            ResponseLevel::Warn => warn!(status, latency_ms, "request completed"),
            ResponseLevel::Error => error!(status, latency_ms, "request failed"),
        }
    }
}

/// Log level for a completed response: redirects and client errors warn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseLevel {
    Info,
    Warn,
    Error,
}

fn response_level(status: u16) -> ResponseLevel {
    match status {
        500.. => ResponseLevel::Error,
        300..=499 => ResponseLevel::Warn,
        _ => ResponseLevel::Info,
    }
}
