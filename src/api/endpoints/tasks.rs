//! Task endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery, UserContext};
use crate::models::{Task, TaskFilter, TaskStatus};
use crate::tasks::{self, NewTask, TaskDetail};

#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct TasksResponse {
    pub tasks: Vec<Task>,
}

#[derive(Deserialize)]
pub struct TaskStatusRequest {
    pub status: TaskStatus,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<TaskQuery>,
    Query(paging): Query<PageQuery>,
) -> Result<Json<TasksResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let filter = TaskFilter {
        status: query.status,
        due_date: query.due_date,
        ..Default::default()
    };
    let tasks = tasks::list_tasks(&conn, &user.actor(), filter, paging.page())?;
    Ok(Json(TasksResponse { tasks }))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let conn = ctx.core.open_db()?;
    let task = tasks::create_task(&conn, &user.actor(), input)?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskDetail>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(tasks::get_task(&conn, &user.actor(), &id)?))
}

pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<TaskStatusRequest>,
) -> Result<Json<Task>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(tasks::update_status(&conn, &user.actor(), &id, body.status)?))
}
