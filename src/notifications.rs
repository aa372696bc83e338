//! Per-user notification inbox and channel preferences.
//!
//! Notifications are plain inbox rows written synchronously by the
//! operation that causes them. Preferences are stored and editable, but
//! nothing on the send path reads them.

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::{Notification, NotificationPreference, NotificationType, Page};

const TITLE_MAX: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found: {0}")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Partial preference edit. Absent toggles keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferenceUpdate {
    pub email_notifications: Option<bool>,
    pub sms_notifications: Option<bool>,
    pub appointment_reminders: Option<bool>,
    pub prescription_alerts: Option<bool>,
    pub task_notifications: Option<bool>,
}

/// Append one notification to `recipient`'s inbox.
pub fn notify(
    conn: &Connection,
    recipient: Uuid,
    sender: Option<Uuid>,
    title: &str,
    message: &str,
    kind: NotificationType,
) -> Result<Notification, DatabaseError> {
    let notification = Notification {
        id: Uuid::new_v4(),
        recipient_id: recipient,
        sender_id: sender,
        title: title.chars().take(TITLE_MAX).collect(),
        message: message.to_string(),
        notification_type: kind,
        is_read: false,
        created_at: db::now(),
    };
    db::insert_notification(conn, &notification)?;
    tracing::debug!(recipient = %recipient, kind = %kind, "Notification queued");
    Ok(notification)
}

pub fn list_inbox(
    conn: &Connection,
    user: &Uuid,
    unread_only: bool,
    page: Page,
) -> Result<Vec<Notification>, NotificationError> {
    Ok(db::list_notifications(conn, user, unread_only, page)?)
}

pub fn unread_count(conn: &Connection, user: &Uuid) -> Result<u32, NotificationError> {
    Ok(db::count_unread_notifications(conn, user)?)
}

/// The `limit` newest notifications, read or not.
pub fn recent(conn: &Connection, user: &Uuid, limit: u32) -> Result<Vec<Notification>, NotificationError> {
    Ok(db::list_notifications(conn, user, false, Page::first(limit))?)
}

/// Idempotent. Someone else's notification is reported as not found.
pub fn mark_read(conn: &Connection, user: &Uuid, id: &Uuid) -> Result<(), NotificationError> {
    if db::mark_notification_read(conn, id, user)? {
        Ok(())
    } else {
        Err(NotificationError::NotFound(*id))
    }
}

pub fn mark_all_read(conn: &Connection, user: &Uuid) -> Result<usize, NotificationError> {
    let updated = db::mark_all_notifications_read(conn, user)?;
    tracing::debug!(user = %user, updated, "Marked all notifications read");
    Ok(updated)
}

/// Stored preferences, created with defaults on first access.
pub fn get_preferences(conn: &Connection, user: &Uuid) -> Result<NotificationPreference, NotificationError> {
    if let Some(pref) = db::get_notification_preference(conn, user)? {
        return Ok(pref);
    }
    let pref = NotificationPreference::defaults_for(*user);
    db::upsert_notification_preference(conn, &pref)?;
    Ok(pref)
}

pub fn update_preferences(
    conn: &Connection,
    user: &Uuid,
    update: PreferenceUpdate,
) -> Result<NotificationPreference, NotificationError> {
    let mut pref = get_preferences(conn, user)?;
    if let Some(v) = update.email_notifications {
        pref.email_notifications = v;
    }
    if let Some(v) = update.sms_notifications {
        pref.sms_notifications = v;
    }
    if let Some(v) = update.appointment_reminders {
        pref.appointment_reminders = v;
    }
    if let Some(v) = update.prescription_alerts {
        pref.prescription_alerts = v;
    }
    if let Some(v) = update.task_notifications {
        pref.task_notifications = v;
    }
    db::upsert_notification_preference(conn, &pref)?;
    Ok(pref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{create_user, new_user};
    use crate::db::open_memory_database;
    use crate::models::Role;

    #[test]
    fn read_twice_keeps_single_read_row() {
        let conn = open_memory_database().unwrap();
        let user = create_user(&conn, new_user("p", Role::Patient)).unwrap();
        let n = notify(&conn, user.id, None, "Hi", "Welcome", NotificationType::Info).unwrap();

        mark_read(&conn, &user.id, &n.id).unwrap();
        mark_read(&conn, &user.id, &n.id).unwrap();

        let inbox = list_inbox(&conn, &user.id, false, Page::default()).unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].is_read);
        assert_eq!(unread_count(&conn, &user.id).unwrap(), 0);
    }

    #[test]
    fn foreign_notification_is_not_found() {
        let conn = open_memory_database().unwrap();
        let owner = create_user(&conn, new_user("a", Role::Patient)).unwrap();
        let other = create_user(&conn, new_user("b", Role::Patient)).unwrap();
        let n = notify(&conn, owner.id, None, "Hi", "x", NotificationType::Info).unwrap();
        assert!(matches!(mark_read(&conn, &other.id, &n.id), Err(NotificationError::NotFound(_))));
        assert_eq!(unread_count(&conn, &owner.id).unwrap(), 1);
    }

    #[test]
    fn recent_is_capped_and_includes_read() {
        let conn = open_memory_database().unwrap();
        let user = create_user(&conn, new_user("n", Role::Nurse)).unwrap();
        for i in 0..7 {
            notify(&conn, user.id, None, &format!("t{i}"), "m", NotificationType::Task).unwrap();
        }
        assert_eq!(mark_all_read(&conn, &user.id).unwrap(), 7);
        let latest = recent(&conn, &user.id, 5).unwrap();
        assert_eq!(latest.len(), 5);
        assert_eq!(latest[0].title, "t6");
        assert!(latest.iter().all(|n| n.is_read));
    }

    #[test]
    fn long_titles_are_truncated() {
        let conn = open_memory_database().unwrap();
        let user = create_user(&conn, new_user("x", Role::Patient)).unwrap();
        let n = notify(&conn, user.id, None, &"a".repeat(250), "m", NotificationType::Info).unwrap();
        assert_eq!(n.title.len(), TITLE_MAX);
    }

    #[test]
    fn preferences_created_lazily_then_updated() {
        let conn = open_memory_database().unwrap();
        let user = create_user(&conn, new_user("d", Role::Doctor)).unwrap();
        assert!(db::get_notification_preference(&conn, &user.id).unwrap().is_none());

        let pref = get_preferences(&conn, &user.id).unwrap();
        assert_eq!(pref, NotificationPreference::defaults_for(user.id));

        let updated = update_preferences(
            &conn,
            &user.id,
            PreferenceUpdate {
                sms_notifications: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(updated.sms_notifications);
        assert!(updated.email_notifications);
        assert_eq!(get_preferences(&conn, &user.id).unwrap(), updated);
    }
}
