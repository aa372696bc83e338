//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves its hash to a user
//! and injects `UserContext` into request extensions for downstream
//! handlers. Unknown, revoked and inactive-user tokens all get a 401.

use axum::extract::OriginalUri;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{hash_token, ApiContext, UserContext};
use crate::db;

/// Refused requests never reach the audit layer, so they are logged here.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    let ctx = req.extensions().get::<ApiContext>().cloned();
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let action = format!("{} {path}", req.method());
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => {
            let response = err.into_response();
            if let Some(ctx) = ctx {
                ctx.core.log_access(None, &action, response.status().as_u16());
            }
            response
        }
    }
}

async fn require_auth_inner(mut req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let user = {
        let conn = ctx.core.open_db()?;
        db::find_user_by_token(&conn, &hash_token(&token))?
    };
    let user = match user {
        Some(user) if user.is_active => user,
        Some(user) => {
            tracing::warn!(user_id = %user.id, "Token presented for inactive user");
            return Err(ApiError::Unauthorized);
        }
        None => return Err(ApiError::Unauthorized),
    };

    req.extensions_mut().insert(UserContext {
        user_id: user.id,
        role: user.role,
        name: user.full_name(),
    });

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    Ok(response)
}
