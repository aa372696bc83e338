//! Dashboard endpoint.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::dashboard::{self, Dashboard};

/// `GET /api/dashboard`: the caller's role summary, computed live.
pub async fn show(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<Dashboard>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(dashboard::build_dashboard(&conn, &user.actor())?))
}
