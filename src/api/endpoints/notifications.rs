//! Notification inbox and preference endpoints.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery, UserContext};
use crate::authorization::{self, Operation};
use crate::config::RECENT_LIMIT;
use crate::models::{Notification, NotificationPreference};
use crate::notifications::{self, PreferenceUpdate};

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize)]
pub struct InboxResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: u32,
}

#[derive(Serialize)]
pub struct RecentResponse {
    pub notifications: Vec<Notification>,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: u32,
}

#[derive(Serialize)]
pub struct ReadAllResponse {
    pub success: bool,
    pub updated: usize,
}

#[derive(Serialize)]
pub struct ReadResponse {
    pub success: bool,
}

pub async fn inbox(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<InboxQuery>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<InboxResponse>, ApiError> {
    authorization::authorize(user.role, Operation::ViewInbox)?;
    let conn = ctx.core.open_db()?;
    let notifications = notifications::list_inbox(&conn, &user.user_id, query.unread_only, paging.page())?;
    let unread_count = notifications::unread_count(&conn, &user.user_id)?;
    Ok(Json(InboxResponse { notifications, unread_count }))
}

pub async fn unread_count(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<CountResponse>, ApiError> {
    authorization::authorize(user.role, Operation::ViewInbox)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(CountResponse {
        count: notifications::unread_count(&conn, &user.user_id)?,
    }))
}

pub async fn recent(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<RecentResponse>, ApiError> {
    authorization::authorize(user.role, Operation::ViewInbox)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(RecentResponse {
        notifications: notifications::recent(&conn, &user.user_id, RECENT_LIMIT)?,
    }))
}

pub async fn mark_read(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReadResponse>, ApiError> {
    authorization::authorize(user.role, Operation::MarkNotificationRead)?;
    let conn = ctx.core.open_db()?;
    notifications::mark_read(&conn, &user.user_id, &id)?;
    Ok(Json(ReadResponse { success: true }))
}

pub async fn mark_all_read(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<ReadAllResponse>, ApiError> {
    authorization::authorize(user.role, Operation::MarkNotificationRead)?;
    let conn = ctx.core.open_db()?;
    let updated = notifications::mark_all_read(&conn, &user.user_id)?;
    Ok(Json(ReadAllResponse { success: true, updated }))
}

pub async fn preferences(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<NotificationPreference>, ApiError> {
    authorization::authorize(user.role, Operation::EditNotificationPreferences)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(notifications::get_preferences(&conn, &user.user_id)?))
}

pub async fn update_preferences(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(update): Json<PreferenceUpdate>,
) -> Result<Json<NotificationPreference>, ApiError> {
    authorization::authorize(user.role, Operation::EditNotificationPreferences)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(notifications::update_preferences(&conn, &user.user_id, update)?))
}
