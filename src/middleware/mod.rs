//! HTTP middleware for transport security, authentication and observability.
//!
//! # Architecture
//!
//! ```text
//! Request → Request ID → Access Log → Security → Auth → Handler → Response
//!                                        ↓         ↓
//!                              500 bad host     401 Unauth
//!                              301/307 redirect
//! ```
//!
//! Security headers are added on the way out, so the auth gate's 401s carry
//! them too.

pub mod access_log;
pub mod auth;
pub mod ip;
pub mod request_id;
pub mod security;

pub use access_log::AccessLog;
pub use auth::{AUTH_HEADER, ApiKeyAuth};
pub use ip::{UNKNOWN_IP, extract_client_ip};
pub use request_id::{REQUEST_ID_HEADER, RequestIdExt, RequestIdLayer};
pub use security::{SecurityLayer, SecurityPolicy};
