//! Network endpoints.
//!
//! - `GET /ip` - the caller's address as seen by the gateway
//! - `POST /wan/update` - hand the router's WAN addresses to the
//!   `wan-update` endpoint script

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use tracing::{info, instrument};

use super::extract::ApiJson;
use crate::bridge::WAN_UPDATE;
use crate::error::AppResult;
use crate::middleware::extract_client_ip;
use crate::models::{IpResponse, WanUpdateRequest, WanUpdateResponse};
use crate::state::AppState;
use crate::validation::validate_address_list;

/// Echo the caller's resolved address.
///
/// # Response Body
///
/// ```json
/// { "ip": "203.0.113.7" }
/// ```
#[instrument(skip_all)]
pub async fn client_ip(State(state): State<AppState>, request: Request<Body>) -> Json<IpResponse> {
    let ip = extract_client_ip(&request, state.config.server.trust_proxy_headers);
    Json(IpResponse { ip: ip.into_owned() })
}

/// Run the `wan-update` script with one argument per address.
///
/// # Request Body
///
/// ```json
/// { "ips": ["1.2.3.4", "5.6.7.8"] }
/// ```
///
/// # Response Body
///
/// ```json
/// { "status": "ok", "output": "<script stdout>" }
/// ```
///
/// An invalid list is rejected with 400 before the script runs. Script
/// failures and timeouts answer 500 without any partial output.
#[instrument(skip_all)]
pub async fn wan_update(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<WanUpdateRequest>,
) -> AppResult<Json<WanUpdateResponse>> {
    validate_address_list(&payload.ips)?;
    let count = payload.ips.len();

    let output = state.bridge.run(WAN_UPDATE, payload.ips).await?;
    info!(count, "WAN addresses updated");

    Ok(Json(WanUpdateResponse::ok(output)))
}
