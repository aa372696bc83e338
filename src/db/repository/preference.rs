use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::NotificationPreference;

pub fn get_notification_preference(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<NotificationPreference>, DatabaseError> {
    let pref = conn
        .query_row(
            "SELECT email_notifications, sms_notifications, appointment_reminders,
                    prescription_alerts, task_notifications
             FROM notification_preferences WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| {
                Ok(NotificationPreference {
                    user_id: *user_id,
                    email_notifications: row.get::<_, i32>(0)? != 0,
                    sms_notifications: row.get::<_, i32>(1)? != 0,
                    appointment_reminders: row.get::<_, i32>(2)? != 0,
                    prescription_alerts: row.get::<_, i32>(3)? != 0,
                    task_notifications: row.get::<_, i32>(4)? != 0,
                })
            },
        )
        .optional()?;
    Ok(pref)
}

pub fn upsert_notification_preference(
    conn: &Connection,
    pref: &NotificationPreference,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notification_preferences (user_id, email_notifications,
         sms_notifications, appointment_reminders, prescription_alerts, task_notifications)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
           email_notifications = excluded.email_notifications,
           sms_notifications = excluded.sms_notifications,
           appointment_reminders = excluded.appointment_reminders,
           prescription_alerts = excluded.prescription_alerts,
           task_notifications = excluded.task_notifications",
        params![
            pref.user_id.to_string(),
            pref.email_notifications as i32,
            pref.sms_notifications as i32,
            pref.appointment_reminders as i32,
            pref.prescription_alerts as i32,
            pref.task_notifications as i32,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_test_user;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;

    #[test]
    fn missing_until_written() {
        let conn = open_memory_database().unwrap();
        let u = insert_test_user(&conn, "u", Role::Patient);
        assert!(get_notification_preference(&conn, &u.id).unwrap().is_none());

        let mut pref = NotificationPreference::defaults_for(u.id);
        upsert_notification_preference(&conn, &pref).unwrap();
        assert_eq!(get_notification_preference(&conn, &u.id).unwrap(), Some(pref.clone()));

        pref.sms_notifications = true;
        pref.task_notifications = false;
        upsert_notification_preference(&conn, &pref).unwrap();
        assert_eq!(get_notification_preference(&conn, &u.id).unwrap(), Some(pref));
    }
}
