use axum::Json;

use crate::models::PingResponse;

/// Liveness check. Authenticated like every other route.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse::pong())
}
