use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AlertType;

/// Portal-wide banner shown on the administrator dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemAlert {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub alert_type: AlertType,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}
