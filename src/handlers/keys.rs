use axum::Json;
use axum::extract::State;
use tracing::instrument;

use crate::credentials::CredentialSet;
use crate::error::AppResult;
use crate::models::ServiceKeyResponse;
use crate::state::AppState;

/// Return the current Shadowsocks service key.
///
/// The key file is re-read on every call so a rotated key is served without
/// a restart. Unreadable or malformed files, and an empty key, answer 500.
#[instrument(skip_all)]
pub async fn service_key(State(state): State<AppState>) -> AppResult<Json<ServiceKeyResponse>> {
    let key = CredentialSet::read_service_key(&state.config.api.key_file).await?;
    Ok(Json(ServiceKeyResponse::ok(key)))
}
