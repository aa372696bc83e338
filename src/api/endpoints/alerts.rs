//! System alert endpoints (super admin only).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::alerts::{self, NewAlert};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::config::PAGE_SIZE;
use crate::models::SystemAlert;

#[derive(Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<SystemAlert>,
}

#[derive(Serialize)]
pub struct DeactivateResponse {
    pub success: bool,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<AlertsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let alerts = alerts::list_active(&conn, &user.actor(), PAGE_SIZE)?;
    Ok(Json(AlertsResponse { alerts }))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(input): Json<NewAlert>,
) -> Result<(StatusCode, Json<SystemAlert>), ApiError> {
    let conn = ctx.core.open_db()?;
    let alert = alerts::create_alert(&conn, &user.actor(), input)?;
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn deactivate(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeactivateResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    alerts::deactivate(&conn, &user.actor(), &id)?;
    Ok(Json(DeactivateResponse { success: true }))
}
