//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::accounts::AccountError;
use crate::alerts::AlertError;
use crate::appointment::AppointmentError;
use crate::authorization::AuthorizationError;
use crate::core_state::CoreError;
use crate::dashboard::DashboardError;
use crate::db::DatabaseError;
use crate::notifications::NotificationError;
use crate::records::RecordError;
use crate::tasks::TaskError;
use crate::validation::{FieldError, ValidationError};
use crate::vitals::VitalsError;

/// Error response body: `{ "error": { code, message, fields? } }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Validation(ValidationError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::InvalidTransition(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = match &self {
            ApiError::Unauthorized => "AUTH_REQUIRED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_FAILED",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InvalidTransition(_) => "INVALID_TRANSITION",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                "INTERNAL"
            }
        };
        let message = self.public_message();
        let fields = match self {
            ApiError::Validation(v) => Some(v.fields),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message, fields },
        };
        (status, Json(body)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════
// Conversions from domain errors
// ═══════════════════════════════════════════════════════════

impl From<AuthorizationError> for ApiError {
    fn from(err: AuthorizationError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => ApiError::NotFound(format!("{entity_type} {id}")),
            DatabaseError::ConstraintViolation(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(v) => ApiError::Validation(v),
            AccountError::Conflict(_) => ApiError::Conflict(err.to_string()),
            AccountError::NotFound(_) => ApiError::NotFound(err.to_string()),
            AccountError::ProfileMismatch { .. } => ApiError::BadRequest(err.to_string()),
            AccountError::Database(e) => e.into(),
        }
    }
}

impl From<AppointmentError> for ApiError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Validation(v) => ApiError::Validation(v),
            AppointmentError::Forbidden(e) => e.into(),
            AppointmentError::NotFound(_) => ApiError::NotFound(err.to_string()),
            AppointmentError::SlotTaken => ApiError::Conflict(err.to_string()),
            AppointmentError::InvalidTransition { .. } => ApiError::InvalidTransition(err.to_string()),
            AppointmentError::Database(e) => e.into(),
        }
    }
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Validation(v) => ApiError::Validation(v),
            RecordError::Forbidden(e) => e.into(),
            RecordError::NotFound(_) => ApiError::NotFound(err.to_string()),
            RecordError::Database(e) => e.into(),
        }
    }
}

impl From<VitalsError> for ApiError {
    fn from(err: VitalsError) -> Self {
        match err {
            VitalsError::Validation(v) => ApiError::Validation(v),
            VitalsError::Forbidden(e) => e.into(),
            VitalsError::Database(e) => e.into(),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Validation(v) => ApiError::Validation(v),
            TaskError::Forbidden(e) => e.into(),
            TaskError::NotFound(_) => ApiError::NotFound(err.to_string()),
            TaskError::InvalidTransition { .. } => ApiError::InvalidTransition(err.to_string()),
            TaskError::Database(e) => e.into(),
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound(_) => ApiError::NotFound(err.to_string()),
            NotificationError::Database(e) => e.into(),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::Forbidden(e) => e.into(),
            DashboardError::Database(e) => e.into(),
        }
    }
}

impl From<AlertError> for ApiError {
    fn from(err: AlertError) -> Self {
        match err {
            AlertError::Validation(v) => ApiError::Validation(v),
            AlertError::Forbidden(e) => e.into(),
            AlertError::NotFound(_) => ApiError::NotFound(err.to_string()),
            AlertError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
        assert!(json["error"].get("fields").is_none());
    }

    #[tokio::test]
    async fn validation_lists_fields() {
        let err: ApiError = ValidationError::single("reason", "This field is required.").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(json["error"]["fields"][0]["field"], "reason");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        assert_eq!(ApiError::from(AppointmentError::SlotTaken).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(AccountError::Conflict("users.username".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(AuthorizationError::NotOwner { entity: "tasks" }).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(NotificationError::NotFound(uuid::Uuid::nil())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DatabaseError::ConstraintViolation("x".into())).status(),
            StatusCode::CONFLICT
        );
    }
}
