use serde::{Deserialize, Serialize};

/// Status value reported by successful action responses.
pub const STATUS_OK: &str = "ok";

/// Body of `POST /wan/update`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WanUpdateRequest {
    /// WAN addresses, passed to the script in order
    pub ips: Vec<String>,
}

/// Response of `GET /ip`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IpResponse {
    pub ip: String,
}

/// Response of a successful `POST /wan/update`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WanUpdateResponse {
    pub status: String,
    /// Script stdout, decoded lossily as UTF-8
    pub output: String,
}

impl WanUpdateResponse {
    pub fn ok(output: String) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            output,
        }
    }
}

/// Response of `GET /ss/key`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceKeyResponse {
    pub status: String,
    pub key: String,
}

impl ServiceKeyResponse {
    pub fn ok(key: String) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            key,
        }
    }
}

/// Response of `GET /ping`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PingResponse {
    pub message: String,
}

impl PingResponse {
    pub fn pong() -> Self {
        Self {
            message: "pong".to_string(),
        }
    }
}
