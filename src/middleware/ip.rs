//! Client address resolution.
//!
//! Used by `GET /ip` and for log fields. Resolution order:
//!
//! 1. First entry of `X-Forwarded-For` (when proxy headers are trusted)
//! 2. `X-Real-IP` (when proxy headers are trusted)
//! 3. TCP peer address from axum's `ConnectInfo`
//! 4. [`UNKNOWN_IP`]
//!
//! # Spoofing
//!
//! Proxy headers are client controlled. Only enable
//! `server.trust_proxy_headers` when the gateway sits behind a reverse proxy
//! that overwrites them:
//!
//! ```nginx
//! proxy_set_header X-Real-IP $remote_addr;
//! proxy_set_header X-Forwarded-For $remote_addr;
//! ```

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

/// Fallback when no client address can be determined.
pub const UNKNOWN_IP: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderIp<'a> {
    FromXff(&'a str),
    FromRealIp(&'a str),
    NotFound,
}

#[inline]
fn ip_from_headers<B>(req: &Request<B>) -> HeaderIp<'_> {
    // "client, proxy1, proxy2": the client is first
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next().map(str::trim)
        && !first_ip.is_empty()
    {
        return HeaderIp::FromXff(first_ip);
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && !value.trim().is_empty()
    {
        return HeaderIp::FromRealIp(value.trim());
    }

    HeaderIp::NotFound
}

/// Resolve the caller's address for `req`.
pub fn extract_client_ip<B>(req: &Request<B>, trust_proxy_headers: bool) -> Cow<'_, str> {
    if trust_proxy_headers {
        match ip_from_headers(req) {
            HeaderIp::FromXff(ip) | HeaderIp::FromRealIp(ip) => return Cow::Borrowed(ip),
            HeaderIp::NotFound => {}
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(Cow::Borrowed(UNKNOWN_IP), |ConnectInfo(addr)| {
            Cow::Owned(addr.ip().to_string())
        })
}
