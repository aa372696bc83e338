//! Audit logging middleware.
//!
//! Records every API request with the caller, method, path and response
//! status. Runs innermost, after auth has injected `UserContext`.

use axum::extract::OriginalUri;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, UserContext};

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    // Nested routers see a stripped path; audit the full one.
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let user_id = req.extensions().get::<UserContext>().map(|u| u.user_id);

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        ctx.core
            .log_access(user_id, &format!("{method} {path}"), response.status().as_u16());
    }
    response
}
