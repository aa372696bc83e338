use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NotificationType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

/// Per-user channel toggles. Persisted and editable, but no delivery
/// path reads them: every notification is an inbox row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub user_id: Uuid,
    pub email_notifications: bool,
    pub sms_notifications: bool,
    pub appointment_reminders: bool,
    pub prescription_alerts: bool,
    pub task_notifications: bool,
}

impl NotificationPreference {
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            email_notifications: true,
            sms_notifications: false,
            appointment_reminders: true,
            prescription_alerts: true,
            task_notifications: true,
        }
    }
}
