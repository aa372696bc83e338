//! Work items assigned to clinical staff.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::{self, Actor, AuthorizationError, Operation, Resource, Scope};
use crate::db::{self, DatabaseError};
use crate::models::{NotificationType, Page, Role, Task, TaskFilter, TaskPriority, TaskStatus, UserRef};
use crate::notifications;
use crate::validation::ValidationError;

const TITLE_MAX: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assigned_to: Uuid,
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub assignee: UserRef,
    pub patient: Option<UserRef>,
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),
    #[error("Task not found: {0}")]
    NotFound(Uuid),
    #[error("Cannot move task from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for TaskError {
    fn from(err: rusqlite::Error) -> Self {
        TaskError::Database(err.into())
    }
}

/// Assign a task and drop a notification in the assignee's inbox.
pub fn create_task(conn: &Connection, actor: &Actor, input: NewTask) -> Result<Task, TaskError> {
    authorization::authorize(actor.role, Operation::CreateTask)?;

    let mut v = ValidationError::new();
    v.require_text(&input.title, "title");
    v.check(
        input.title.chars().count() <= TITLE_MAX,
        "title",
        "Ensure this value has at most 200 characters.",
    );
    v.check(
        db::user_has_role(conn, &input.assigned_to, &[Role::Doctor, Role::Nurse])?,
        "assigned_to",
        "Select an active doctor or nurse.",
    );
    if let Some(patient) = input.patient_id {
        v.check(
            db::user_has_role(conn, &patient, &[Role::Patient])?,
            "patient_id",
            "Select a valid patient.",
        );
    }
    v.into_result()?;

    let now = db::now();
    let task = Task {
        id: Uuid::new_v4(),
        title: input.title.trim().to_string(),
        description: input.description,
        assigned_to: input.assigned_to,
        patient_id: input.patient_id,
        priority: input.priority.unwrap_or(TaskPriority::Medium),
        status: TaskStatus::Pending,
        due_date: input.due_date,
        created_at: now,
        updated_at: now,
        completed_at: None,
    };

    let tx = conn.unchecked_transaction()?;
    db::insert_task(&tx, &task)?;
    notifications::notify(
        &tx,
        task.assigned_to,
        Some(actor.user_id),
        &format!("New Task: {}", task.title),
        &format!("A {} priority task is due on {}.", task.priority, task.due_date),
        NotificationType::Task,
    )?;
    tx.commit()?;

    tracing::info!(task_id = %task.id, assigned_to = %task.assigned_to, "Task created");
    Ok(task)
}

/// Staff see their own queue; admins see everything.
pub fn list_tasks(
    conn: &Connection,
    actor: &Actor,
    mut filter: TaskFilter,
    page: Page,
) -> Result<Vec<Task>, TaskError> {
    authorization::authorize(actor.role, Operation::ListTasks)?;
    match authorization::list_scope(actor.role, Resource::Tasks) {
        Scope::AssignedTo => filter.assigned_to = Some(actor.user_id),
        Scope::All => {}
        _ => return Ok(Vec::new()),
    }
    Ok(db::list_tasks(conn, &filter, page)?)
}

pub fn get_task(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<TaskDetail, TaskError> {
    authorization::authorize(actor.role, Operation::ListTasks)?;
    let task = db::get_task(conn, id)?.ok_or(TaskError::NotFound(*id))?;
    authorization::check_task_access(actor, &task).require("tasks")?;

    let assignee = db::get_user(conn, &task.assigned_to)?.ok_or(TaskError::NotFound(*id))?;
    let patient = match task.patient_id {
        Some(pid) => db::get_user(conn, &pid)?.as_ref().map(UserRef::from),
        None => None,
    };
    Ok(TaskDetail {
        assignee: UserRef::from(&assignee),
        patient,
        task,
    })
}

pub fn update_status(conn: &Connection, actor: &Actor, id: &Uuid, target: TaskStatus) -> Result<Task, TaskError> {
    authorization::authorize(actor.role, Operation::UpdateTaskStatus)?;
    let task = db::get_task(conn, id)?.ok_or(TaskError::NotFound(*id))?;
    authorization::check_task_access(actor, &task).require("tasks")?;

    let from = task.status;
    if !from.can_transition_to(target) {
        return Err(TaskError::InvalidTransition { from, to: target });
    }
    if !db::update_task_status(conn, id, from, target)? {
        let current = db::get_task(conn, id)?.map(|t| t.status).unwrap_or(from);
        return Err(TaskError::InvalidTransition { from: current, to: target });
    }
    tracing::info!(task_id = %id, %from, to = %target, "Task status updated");
    db::get_task(conn, id)?.ok_or(TaskError::NotFound(*id))
}
