//! Vital sign endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery, UserContext};
use crate::models::VitalSigns;
use crate::vitals::{self, NewVitals};

#[derive(Debug, Default, Deserialize)]
pub struct VitalsQuery {
    pub patient_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct VitalsResponse {
    pub vitals: Vec<VitalSigns>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<VitalsQuery>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<VitalsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let vitals = vitals::list_vitals(&conn, &user.actor(), query.patient_id, paging.page())?;
    Ok(Json(VitalsResponse { vitals }))
}

pub async fn record(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(input): Json<NewVitals>,
) -> Result<(StatusCode, Json<VitalSigns>), ApiError> {
    let conn = ctx.core.open_db()?;
    let stored = vitals::record_vitals(&conn, &user.actor(), input)?;
    Ok((StatusCode::CREATED, Json(stored)))
}
