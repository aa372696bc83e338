//! Medical record endpoints, including the plain-text download.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery, UserContext};
use crate::models::{MedicalRecord, MedicalRecordFilter, Prescription};
use crate::records::{self, MedicalRecordDetail, NewMedicalRecord, NewPrescription};

#[derive(Debug, Default, Deserialize)]
pub struct RecordQuery {
    pub patient_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct RecordsResponse {
    pub records: Vec<MedicalRecord>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<RecordQuery>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let filter = MedicalRecordFilter {
        patient_id: query.patient_id,
        ..Default::default()
    };
    let records = records::list_records(&conn, &user.actor(), filter, paging.page())?;
    Ok(Json(RecordsResponse { records }))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(input): Json<NewMedicalRecord>,
) -> Result<(StatusCode, Json<MedicalRecordDetail>), ApiError> {
    let conn = ctx.core.open_db()?;
    let detail = records::create_record(&conn, &user.actor(), input)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<MedicalRecordDetail>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(records::get_record(&conn, &user.actor(), &id)?))
}

pub async fn add_prescription(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<NewPrescription>,
) -> Result<(StatusCode, Json<Prescription>), ApiError> {
    let conn = ctx.core.open_db()?;
    let prescription = records::add_prescription(&conn, &user.actor(), &id, input)?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

/// `GET /api/records/:id/download`: `text/plain` attachment.
pub async fn download(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let conn = ctx.core.open_db()?;
    let (filename, body) = records::download_record(&conn, &user.actor(), &id)?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
