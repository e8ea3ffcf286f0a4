//! Liveness handler.

use crate::models::HealthResponse;
use axum::Json;

/// Handler for GET /health
///
/// Does not touch upstream APIs; a failure means the process is wedged.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}
