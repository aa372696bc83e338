//! System-wide alerts shown on the admin dashboard.

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{self, Actor, AuthorizationError, Operation};
use crate::db::{self, DatabaseError};
use crate::models::{AlertType, SystemAlert};
use crate::validation::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct NewAlert {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub alert_type: Option<AlertType>,
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),
    #[error("Alert not found: {0}")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

pub fn create_alert(conn: &Connection, actor: &Actor, input: NewAlert) -> Result<SystemAlert, AlertError> {
    authorization::authorize(actor.role, Operation::ManageSystemAlerts)?;
    let mut v = ValidationError::new();
    v.require_text(&input.title, "title");
    v.check(input.title.chars().count() <= 200, "title", "Ensure this value has at most 200 characters.");
    v.require_text(&input.message, "message");
    v.into_result()?;

    let alert = SystemAlert {
        id: Uuid::new_v4(),
        title: input.title.trim().to_string(),
        message: input.message,
        alert_type: input.alert_type.unwrap_or(AlertType::Info),
        is_active: true,
        created_at: db::now(),
    };
    db::insert_system_alert(conn, &alert)?;
    tracing::info!(alert_id = %alert.id, kind = %alert.alert_type, "System alert raised");
    Ok(alert)
}

pub fn list_active(conn: &Connection, actor: &Actor, limit: u32) -> Result<Vec<SystemAlert>, AlertError> {
    authorization::authorize(actor.role, Operation::ManageSystemAlerts)?;
    Ok(db::list_active_system_alerts(conn, limit)?)
}

pub fn deactivate(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<(), AlertError> {
    authorization::authorize(actor.role, Operation::ManageSystemAlerts)?;
    db::deactivate_system_alert(conn, id).map_err(|e| match e {
        DatabaseError::NotFound { .. } => AlertError::NotFound(*id),
        other => other.into(),
    })?;
    tracing::info!(alert_id = %id, "System alert deactivated");
    Ok(())
}
