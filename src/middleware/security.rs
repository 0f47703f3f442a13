//! Transport security middleware.
//!
//! Runs before authentication and:
//!
//! - refuses requests whose `Host` is not in `security.allowed_hosts`
//!   (500, empty body) when the list is non-empty
//! - redirects plain HTTP to HTTPS when `security.ssl_redirect` is set
//! - adds the security response headers to everything that passes through,
//!   including 401s from the auth gate
//!
//! `Strict-Transport-Security` is only sent on requests that arrived over
//! TLS, either directly or per a trusted `X-Forwarded-Proto: https`.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{
    CONTENT_SECURITY_POLICY, HOST, LOCATION, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
    X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use axum::http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::warn;

use crate::config::SecurityConfig;
use crate::metrics;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Prebuilt security policy shared by every request.
#[derive(Debug)]
pub struct SecurityPolicy {
    headers: HeaderMap,
    hsts: Option<HeaderValue>,
    allowed_hosts: Vec<String>,
    ssl_redirect: bool,
    redirect_status: StatusCode,
    ssl_host: Option<String>,
    tls: bool,
    trust_proxy_headers: bool,
}

impl SecurityPolicy {
    /// Build the policy. `tls` is whether the listener itself terminates TLS.
    pub fn new(config: &SecurityConfig, tls: bool, trust_proxy_headers: bool) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));

        // Unrepresentable values are skipped rather than failing startup
        if let Ok(value) = HeaderValue::from_str(&config.frame_options) {
            headers.insert(X_FRAME_OPTIONS, value);
        }
        if let Ok(value) = HeaderValue::from_str(&config.content_security_policy) {
            headers.insert(CONTENT_SECURITY_POLICY, value);
        }
        if let Ok(value) = HeaderValue::from_str(&config.referrer_policy) {
            headers.insert(REFERRER_POLICY, value);
        }

        let hsts = (config.hsts_max_age > 0).then(|| {
            let value = if config.hsts_include_subdomains {
                format!("max-age={}; includeSubDomains", config.hsts_max_age)
            } else {
                format!("max-age={}", config.hsts_max_age)
            };
            HeaderValue::from_str(&value).ok()
        });

        Self {
            headers,
            hsts: hsts.flatten(),
            allowed_hosts: config
                .allowed_hosts
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            ssl_redirect: config.ssl_redirect,
            redirect_status: if config.ssl_temporary_redirect {
                StatusCode::TEMPORARY_REDIRECT
            } else {
                StatusCode::MOVED_PERMANENTLY
            },
            ssl_host: config.ssl_host.clone().filter(|h| !h.is_empty()),
            tls,
            trust_proxy_headers,
        }
    }

    fn is_ssl<B>(&self, req: &Request<B>) -> bool {
        self.tls
            || (self.trust_proxy_headers
                && req
                    .headers()
                    .get(FORWARDED_PROTO)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.eq_ignore_ascii_case("https")))
    }

    fn host_allowed(&self, host: Option<&str>) -> bool {
        if self.allowed_hosts.is_empty() {
            return true;
        }
        host.is_some_and(|host| {
            let host = host.to_ascii_lowercase();
            self.allowed_hosts.iter().any(|allowed| *allowed == host)
        })
    }

    fn redirect_location<B>(&self, req: &Request<B>, host: Option<&str>) -> Option<HeaderValue> {
        let host = self.ssl_host.as_deref().or(host)?;
        let path = req
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        HeaderValue::from_str(&format!("https://{host}{path}")).ok()
    }

    fn apply_headers(&self, headers: &mut HeaderMap, ssl: bool) {
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        if ssl && let Some(hsts) = &self.hsts {
            headers.insert(STRICT_TRANSPORT_SECURITY, hsts.clone());
        }
    }
}

/// Security middleware layer.
#[derive(Clone)]
pub struct SecurityLayer {
    policy: Arc<SecurityPolicy>,
}

impl SecurityLayer {
    pub fn new(policy: SecurityPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }
}

impl<S> Layer<S> for SecurityLayer {
    type Service = SecurityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SecurityService<S> {
    inner: S,
    policy: Arc<SecurityPolicy>,
}

impl<S> Service<Request<Body>> for SecurityService<S>
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
        let policy = self.policy.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let host = req
                .headers()
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .or_else(|| req.uri().authority().map(|a| a.as_str()))
                .map(str::to_owned);

            if !policy.host_allowed(host.as_deref()) {
                metrics::record_security_rejection("bad_host");
                warn!(host = ?host, "Request rejected: host not allowed");
                return Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }

            let ssl = policy.is_ssl(&req);

            if policy.ssl_redirect && !ssl {
                if let Some(location) = policy.redirect_location(&req, host.as_deref()) {
                    metrics::record_security_rejection("ssl_redirect");
                    let mut response = policy.redirect_status.into_response();
                    response.headers_mut().insert(LOCATION, location);
                    return Ok(response);
                }
                warn!("Cannot build HTTPS redirect without a host");
                metrics::record_security_rejection("bad_host");
                return Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }

            let mut response = inner.call(req).await?;
            policy.apply_headers(response.headers_mut(), ssl);
            Ok(response)
        })
    }
}
