//! User administration endpoints (super admin only).
//!
//! - `GET /api/users`: list, filterable by role and active flag
//! - `POST /api/users`: create a user and issue its first token
//! - `GET /api/users/:id`: user with role profile
//! - `POST /api/users/:id/active`: activate or deactivate

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::{self, NewUser, UserDetail};
use crate::api::error::ApiError;
use crate::api::types::{issue_token, ApiContext, PageQuery, UserContext};
use crate::authorization::{self, Operation};
use crate::models::{Role, User, UserFilter};

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

#[derive(Serialize)]
pub struct CreatedUserResponse {
    pub user: UserDetail,
    /// Plaintext bearer token. Shown only in this response.
    pub token: String,
}

#[derive(Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<UserQuery>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<UsersResponse>, ApiError> {
    authorization::authorize(user.role, Operation::ListUsers)?;
    let conn = ctx.core.open_db()?;
    let filter = UserFilter {
        role: query.role,
        active_only: query.active_only,
    };
    let users = accounts::list_users(&conn, &filter, paging.page())?;
    Ok(Json(UsersResponse { users }))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(input): Json<NewUser>,
) -> Result<(StatusCode, Json<CreatedUserResponse>), ApiError> {
    authorization::authorize(user.role, Operation::CreateUser)?;
    let conn = ctx.core.open_db()?;
    let created = accounts::create_user(&conn, input)?;
    let token = issue_token(&conn, &created.id)?;
    let detail = accounts::get_user_detail(&conn, &created.id)?;
    Ok((StatusCode::CREATED, Json(CreatedUserResponse { user: detail, token })))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDetail>, ApiError> {
    authorization::authorize(user.role, Operation::ViewUser)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::get_user_detail(&conn, &id)?))
}

pub async fn set_active(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<ActiveRequest>,
) -> Result<Json<User>, ApiError> {
    authorization::authorize(user.role, Operation::SetUserActive)?;
    if id == user.user_id && !body.active {
        return Err(ApiError::BadRequest("You cannot deactivate your own account".into()));
    }
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::set_user_active(&conn, &id, body.active)?))
}
