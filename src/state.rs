//! Shared application state for Axum handlers.
//!
//! Everything here is read-only after startup: the configuration, the
//! credentials loaded for the auth gate, and the execution bridge. Cloning is
//! cheap (`Arc`s and a small bridge struct), one clone per request.

use std::sync::Arc;

use crate::bridge::ExecutionBridge;
use crate::config::Config;
use crate::credentials::CredentialSet;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: Arc<CredentialSet>,
    pub bridge: ExecutionBridge,
}

impl AppState {
    pub fn new(config: Config, credentials: CredentialSet) -> Self {
        let bridge = ExecutionBridge::new(&config.api);
        Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            bridge,
        }
    }
}
