//! # mptcpkit-api
//!
//! Authenticated HTTP gateway for an MPTCP aggregation router. Requests are
//! checked against a static API key, then either answered directly or handed
//! to an endpoint script run in a sanitized subprocess.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Axum HTTP(S) Server                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Access Log → Security → Auth)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (/ip, /wan/update, /ss/key, /ping)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ExecutionBridge (sanitized env, discrete args, deadline)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  /bin/sh <script_dir>/<script> <args...>                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use mptcpkit_api::{AppState, Config, CredentialSet, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("/etc/mptcpkit/config.yml"))?;
//!     let credentials = CredentialSet::load(&config.api.key_file).await?;
//!
//!     let app = build_router(AppState::new(config, credentials));
//!
//!     // Serve `app`...
//!     Ok(())
//! }
//! ```
//!
//! ## Calling the Gateway
//!
//! ```bash
//! curl -H "X-MptcpKit-Auth: $KEY" -d '{"ips":["1.2.3.4"]}' \
//!      -H 'content-type: application/json' https://gateway:8080/wan/update
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::Config;
pub use credentials::CredentialSet;
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
