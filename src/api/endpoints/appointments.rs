//! Appointment endpoints.
//!
//! - `GET /api/appointments`: scoped list, filterable by status and date
//! - `POST /api/appointments`: book
//! - `GET /api/appointments/:id`: detail
//! - `POST /api/appointments/:id/{approve,reject,complete,cancel}`: lifecycle
//! - `POST /api/appointments/:id/status`: lifecycle from a raw status string

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery, UserContext};
use crate::appointment::{self, AppointmentDetail, BookingRequest, TransitionOutcome};
use crate::models::{Appointment, AppointmentFilter, AppointmentStatus};

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentQuery {
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<AppointmentQuery>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let filter = AppointmentFilter {
        status: query.status,
        date: query.date,
        ..Default::default()
    };
    let appointments = appointment::list_for(&conn, &user.actor(), filter, paging.page())?;
    Ok(Json(AppointmentsResponse { appointments }))
}

pub async fn book(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let conn = ctx.core.open_db()?;
    let booked = appointment::book_appointment(&conn, &user.actor(), req)?;
    Ok((StatusCode::CREATED, Json(booked)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<AppointmentDetail>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(appointment::get_for(&conn, &user.actor(), &id)?))
}

async fn move_to(
    ctx: ApiContext,
    user: UserContext,
    id: Uuid,
    target: AppointmentStatus,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(appointment::transition(&conn, &user.actor(), &id, target)?))
}

pub async fn approve(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    move_to(ctx, user, id, AppointmentStatus::Approved).await
}

pub async fn reject(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    move_to(ctx, user, id, AppointmentStatus::Rejected).await
}

pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    move_to(ctx, user, id, AppointmentStatus::Completed).await
}

pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    move_to(ctx, user, id, AppointmentStatus::Cancelled).await
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Serialize)]
struct StatusSuccess {
    success: bool,
    status: AppointmentStatus,
}

#[derive(Serialize)]
struct StatusFailure {
    error: String,
}

/// `POST /api/appointments/:id/status`: flat `{success, status}` or
/// `{error}` body instead of the structured error envelope.
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusRequest>,
) -> Response {
    let result = ctx
        .core
        .open_db()
        .map_err(ApiError::from)
        .and_then(|conn| {
            appointment::update_status(&conn, &user.actor(), &id, &body.status).map_err(ApiError::from)
        });
    match result {
        Ok(outcome) => Json(StatusSuccess {
            success: true,
            status: outcome.appointment.status,
        })
        .into_response(),
        Err(err) => {
            let status = err.status();
            let error = match &err {
                ApiError::Validation(v) => v
                    .fields
                    .first()
                    .map(|f| f.message.clone())
                    .unwrap_or_else(|| err.public_message()),
                ApiError::Forbidden(_) => "Permission denied".to_string(),
                _ => err.public_message(),
            };
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                tracing::error!("Appointment status update failed: {err}");
            }
            (status, Json(StatusFailure { error })).into_response()
        }
    }
}
