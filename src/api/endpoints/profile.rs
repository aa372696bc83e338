//! Own-profile endpoints, available to every role.

use axum::extract::State;
use axum::{Extension, Json};

use crate::accounts::{self, ContactUpdate, RoleProfileUpdate, UserDetail};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::authorization::{self, Operation};
use crate::models::RoleProfile;

/// `GET /api/profile`
pub async fn show(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<UserDetail>, ApiError> {
    authorization::authorize(user.role, Operation::ViewOwnProfile)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::get_user_detail(&conn, &user.user_id)?))
}

/// `PUT /api/profile`: contact fields.
pub async fn update_contact(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(update): Json<ContactUpdate>,
) -> Result<Json<UserDetail>, ApiError> {
    authorization::authorize(user.role, Operation::UpdateOwnProfile)?;
    let conn = ctx.core.open_db()?;
    accounts::update_contact(&conn, &user.user_id, update)?;
    Ok(Json(accounts::get_user_detail(&conn, &user.user_id)?))
}

/// `PUT /api/profile/role`: doctor, nurse or patient profile fields.
pub async fn update_role(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(update): Json<RoleProfileUpdate>,
) -> Result<Json<RoleProfile>, ApiError> {
    authorization::authorize(user.role, Operation::UpdateOwnProfile)?;
    let conn = ctx.core.open_db()?;
    let me = accounts::get_user(&conn, &user.user_id)?;
    Ok(Json(accounts::update_role_profile(&conn, &me, update)?))
}
