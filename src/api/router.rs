//! API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! Extension(ApiContext) → Trace → Auth → Audit → handler

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers apply bottom-up: the last `.layer` is the outermost.
    // Extension must be outermost so every middleware can read ApiContext.
    // Path params use `:param` syntax (axum 0.7).
    let protected = Router::new()
        .route("/dashboard", get(endpoints::dashboard::show))
        .route("/users", get(endpoints::users::list).post(endpoints::users::create))
        .route("/users/:id", get(endpoints::users::detail))
        .route("/users/:id/active", post(endpoints::users::set_active))
        .route(
            "/profile",
            get(endpoints::profile::show).put(endpoints::profile::update_contact),
        )
        .route("/profile/role", axum::routing::put(endpoints::profile::update_role))
        .route(
            "/appointments",
            get(endpoints::appointments::list).post(endpoints::appointments::book),
        )
        .route("/appointments/:id", get(endpoints::appointments::detail))
        .route("/appointments/:id/approve", post(endpoints::appointments::approve))
        .route("/appointments/:id/reject", post(endpoints::appointments::reject))
        .route("/appointments/:id/complete", post(endpoints::appointments::complete))
        .route("/appointments/:id/cancel", post(endpoints::appointments::cancel))
        .route("/appointments/:id/status", post(endpoints::appointments::update_status))
        .route("/records", get(endpoints::records::list).post(endpoints::records::create))
        .route("/records/:id", get(endpoints::records::detail))
        .route("/records/:id/prescriptions", post(endpoints::records::add_prescription))
        .route("/records/:id/download", get(endpoints::records::download))
        .route("/vitals", get(endpoints::vitals::list).post(endpoints::vitals::record))
        .route("/tasks", get(endpoints::tasks::list).post(endpoints::tasks::create))
        .route("/tasks/:id", get(endpoints::tasks::detail))
        .route("/tasks/:id/status", post(endpoints::tasks::update_status))
        .route("/notifications", get(endpoints::notifications::inbox))
        .route("/notifications/read-all", post(endpoints::notifications::mark_all_read))
        .route("/notifications/unread-count", get(endpoints::notifications::unread_count))
        .route("/notifications/recent", get(endpoints::notifications::recent))
        .route(
            "/notifications/preferences",
            get(endpoints::notifications::preferences).put(endpoints::notifications::update_preferences),
        )
        .route("/notifications/:id/read", post(endpoints::notifications::mark_read))
        .route("/alerts", get(endpoints::alerts::list).post(endpoints::alerts::create))
        .route("/alerts/:id/deactivate", post(endpoints::alerts::deactivate))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone())
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(ctx));

    Router::new().nest("/api", protected).nest("/api", unprotected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Duration;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::accounts::{self, new_user};
    use crate::api::types::issue_token;
    use crate::db;
    use crate::models::Role;

    struct TestApp {
        core: Arc<CoreState>,
        _dir: tempfile::TempDir,
    }

    struct Login {
        id: Uuid,
        token: String,
    }

    impl TestApp {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let core = Arc::new(CoreState::new(dir.path().join("medora.db")));
            Self { core, _dir: dir }
        }

        fn user(&self, username: &str, role: Role) -> Login {
            let conn = self.core.open_db().unwrap();
            let user = accounts::create_user(&conn, new_user(username, role)).unwrap();
            let token = issue_token(&conn, &user.id).unwrap();
            Login { id: user.id, token }
        }

        async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
            let response = self.raw(method, uri, token, body).await;
            let status = response.status();
            let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, json)
        }

        async fn raw(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> axum::response::Response {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("Authorization", format!("Bearer {token}"));
            }
            let body = match body {
                Some(json) => {
                    builder = builder.header("Content-Type", "application/json");
                    Body::from(json.to_string())
                }
                None => Body::empty(),
            };
            api_router(self.core.clone())
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap()
        }
    }

    fn tomorrow() -> String {
        (db::now().date() + Duration::days(1)).to_string()
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let app = TestApp::new();
        let (status, json) = app.send("GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], true);
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_401() {
        let app = TestApp::new();
        let (status, json) = app.send("GET", "/api/dashboard", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");

        let (status, _) = app.send("GET", "/api/dashboard", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(app.core.audit_entries().iter().all(|e| e.status == 401 && e.user_id.is_none()));
    }

    #[tokio::test]
    async fn deactivated_user_is_locked_out() {
        let app = TestApp::new();
        let admin = app.user("root", Role::SuperAdmin);
        let nurse = app.user("nurse", Role::Nurse);

        let (status, _) = app.send("GET", "/api/dashboard", Some(&nurse.token), None).await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!("/api/users/{}/active", nurse.id);
        let (status, json) = app.send("POST", &uri, Some(&admin.token), Some(json!({"active": false}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["is_active"], false);

        let (status, _) = app.send("GET", "/api/dashboard", Some(&nurse.token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_creates_user_with_working_token() {
        let app = TestApp::new();
        let admin = app.user("root", Role::SuperAdmin);
        let body = json!({
            "username": "drhouse",
            "email": "house@medora.test",
            "role": "doctor",
            "first_name": "Gregory",
            "last_name": "House"
        });
        let (status, json) = app.send("POST", "/api/users", Some(&admin.token), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["user"]["profile"]["kind"], "doctor");
        let token = json["token"].as_str().unwrap().to_string();

        let (status, json) = app.send("GET", "/api/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["full_name"], "Gregory House");

        let (status, json) = app.send("POST", "/api/users", Some(&admin.token), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn patient_cannot_manage_users() {
        let app = TestApp::new();
        let patient = app.user("pat", Role::Patient);
        let (status, json) = app.send("GET", "/api/users", Some(&patient.token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn booking_approval_and_duplicate_slot() {
        let app = TestApp::new();
        let doctor = app.user("doc", Role::Doctor);
        let patient = app.user("pat", Role::Patient);
        let booking = json!({
            "doctor_id": doctor.id,
            "date": tomorrow(),
            "time": "10:30:00",
            "reason": "Annual checkup"
        });

        let (status, json) = app
            .send("POST", "/api/appointments", Some(&patient.token), Some(booking.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["status"], "pending");
        let id = json["id"].as_str().unwrap().to_string();

        let (status, _) = app.send("POST", "/api/appointments", Some(&patient.token), Some(booking)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, json) = app
            .send("POST", &format!("/api/appointments/{id}/approve"), Some(&doctor.token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["appointment"]["status"], "approved");

        let (status, json) = app
            .send("GET", "/api/notifications/unread-count", Some(&patient.token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 1);

        let (status, json) = app
            .send("POST", &format!("/api/appointments/{id}/reject"), Some(&doctor.token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn status_endpoint_uses_flat_bodies() {
        let app = TestApp::new();
        let doctor = app.user("doc", Role::Doctor);
        let other = app.user("doc2", Role::Doctor);
        let patient = app.user("pat", Role::Patient);
        let booking = json!({
            "doctor_id": doctor.id,
            "date": tomorrow(),
            "time": "09:00:00",
            "reason": "Cough"
        });
        let (_, json) = app.send("POST", "/api/appointments", Some(&patient.token), Some(booking)).await;
        let uri = format!("/api/appointments/{}/status", json["id"].as_str().unwrap());

        let (status, json) = app.send("POST", &uri, Some(&doctor.token), Some(json!({"status": "bogus"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid status");

        let (status, json) = app.send("POST", &uri, Some(&other.token), Some(json!({"status": "approved"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "Permission denied");

        let (status, json) = app.send("POST", &uri, Some(&doctor.token), Some(json!({"status": "approved"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"success": true, "status": "approved"}));
    }

    #[tokio::test]
    async fn record_download_is_plain_text_attachment() {
        let app = TestApp::new();
        let doctor = app.user("doc", Role::Doctor);
        let patient = app.user("pat", Role::Patient);
        let other = app.user("pat2", Role::Patient);
        let record = json!({
            "patient_id": patient.id,
            "diagnosis": "Migraine",
            "treatment": "Rest and hydration",
            "visit_date": "2025-03-04"
        });
        let (status, json) = app.send("POST", "/api/records", Some(&doctor.token), Some(record)).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = json["id"].as_str().unwrap().to_string();
        let uri = format!("/api/records/{id}/download");

        let response = app.raw("GET", &uri, Some(&patient.token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain; charset=utf-8");
        assert_eq!(
            response.headers()["content-disposition"],
            format!("attachment; filename=\"medical_record_{id}.txt\"").as_str()
        );
        let body = to_bytes(response.into_body(), 1 << 16).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Diagnosis: Migraine"));

        let (status, _) = app.send("GET", &uri, Some(&other.token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, json) = app.send("GET", "/api/records", Some(&other.token), None).await;
        assert_eq!(json["records"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn validation_errors_carry_fields() {
        let app = TestApp::new();
        let nurse = app.user("nurse", Role::Nurse);
        let patient = app.user("pat", Role::Patient);
        let vitals = json!({
            "patient_id": patient.id,
            "blood_pressure_systolic": 120,
            "blood_pressure_diastolic": 80,
            "heart_rate": 500,
            "temperature": 36.8,
            "oxygen_saturation": 97
        });
        let (status, json) = app.send("POST", "/api/vitals", Some(&nurse.token), Some(vitals)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(json["error"]["fields"][0]["field"], "heart_rate");
    }

    #[tokio::test]
    async fn task_flow_and_notification_read() {
        let app = TestApp::new();
        let doctor = app.user("doc", Role::Doctor);
        let nurse = app.user("nurse", Role::Nurse);
        let task = json!({
            "title": "Change dressing",
            "assigned_to": nurse.id,
            "priority": "high",
            "due_date": tomorrow()
        });
        let (status, json) = app.send("POST", "/api/tasks", Some(&doctor.token), Some(task)).await;
        assert_eq!(status, StatusCode::CREATED);
        let task_id = json["id"].as_str().unwrap().to_string();

        let (_, json) = app.send("GET", "/api/tasks", Some(&nurse.token), None).await;
        assert_eq!(json["tasks"].as_array().unwrap().len(), 1);

        let uri = format!("/api/tasks/{task_id}/status");
        let (status, json) = app.send("POST", &uri, Some(&nurse.token), Some(json!({"status": "completed"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "completed");

        let (_, json) = app.send("GET", "/api/notifications?unread_only=true", Some(&nurse.token), None).await;
        assert_eq!(json["unread_count"], 1);
        let note_id = json["notifications"][0]["id"].as_str().unwrap().to_string();
        let read_uri = format!("/api/notifications/{note_id}/read");
        for _ in 0..2 {
            let (status, _) = app.send("POST", &read_uri, Some(&nurse.token), None).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = app.send("POST", &read_uri, Some(&doctor.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn requests_are_audited_with_user() {
        let app = TestApp::new();
        let admin = app.user("root", Role::SuperAdmin);
        app.send("GET", "/api/alerts", Some(&admin.token), None).await;
        let entries = app.core.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, Some(admin.id));
        assert_eq!(entries[0].action, "GET /api/alerts");
        assert_eq!(entries[0].status, 200);
    }
}
