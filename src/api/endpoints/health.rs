//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
}

/// `GET /api/health`: unauthenticated liveness probe.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let database = match ctx.core.open_db() {
        Ok(_) => true,
        Err(e) => {
            tracing::error!("Health check could not open database: {e}");
            false
        }
    };
    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        version: crate::config::APP_VERSION,
    })
}
