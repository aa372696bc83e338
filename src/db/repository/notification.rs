use rusqlite::types::ToSql;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{datetime_at, enum_at, fmt_datetime, opt_uuid_at, uuid_at, Conditions};
use crate::db::DatabaseError;
use crate::models::{Notification, Page};

pub fn insert_notification(conn: &Connection, n: &Notification) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notifications (id, recipient_id, sender_id, title, message,
         notification_type, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            n.id.to_string(),
            n.recipient_id.to_string(),
            n.sender_id.map(|id| id.to_string()),
            n.title,
            n.message,
            n.notification_type.as_str(),
            n.is_read as i32,
            fmt_datetime(&n.created_at),
        ],
    )?;
    Ok(())
}

/// Inbox of `recipient_id`, newest first.
pub fn list_notifications(
    conn: &Connection,
    recipient_id: &Uuid,
    unread_only: bool,
    page: Page,
) -> Result<Vec<Notification>, DatabaseError> {
    let mut c = Conditions::default();
    c.push("recipient_id =", recipient_id.to_string());
    if unread_only {
        c.push_raw("is_read = 0");
    }
    let idx = c.next_index();
    let sql = format!(
        "SELECT id, recipient_id, sender_id, title, message, notification_type, is_read, created_at
         FROM notifications WHERE 1=1{}
         ORDER BY created_at DESC, rowid DESC LIMIT ?{idx} OFFSET ?{}",
        c.sql(),
        idx + 1
    );
    let limit = page.limit as i64;
    let offset = page.offset as i64;
    let paging: [&dyn ToSql; 2] = [&limit, &offset];
    let params = c.params_with(&paging);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok(Notification {
                id: uuid_at(row, 0)?,
                recipient_id: uuid_at(row, 1)?,
                sender_id: opt_uuid_at(row, 2)?,
                title: row.get(3)?,
                message: row.get(4)?,
                notification_type: enum_at(row, 5)?,
                is_read: row.get::<_, i32>(6)? != 0,
                created_at: datetime_at(row, 7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_unread_notifications(conn: &Connection, recipient_id: &Uuid) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
        params![recipient_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Count notifications of `recipient_id` (test and dashboard helper).
pub fn count_notifications(conn: &Connection, recipient_id: &Uuid) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1",
        params![recipient_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Flag one notification read. Returns false when it does not belong to
/// `recipient_id` (or does not exist). Already-read rows still match.
pub fn mark_notification_read(
    conn: &Connection,
    id: &Uuid,
    recipient_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND recipient_id = ?2",
        params![id.to_string(), recipient_id.to_string()],
    )?;
    Ok(updated == 1)
}

/// Returns the number of rows flipped from unread to read.
pub fn mark_all_notifications_read(conn: &Connection, recipient_id: &Uuid) -> Result<usize, DatabaseError> {
    let updated = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
        params![recipient_id.to_string()],
    )?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_test_user, now};
    use crate::db::sqlite::open_memory_database;
    use crate::models::{NotificationType, Role};

    fn notification(recipient: Uuid, title: &str) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_id: recipient,
            sender_id: None,
            title: title.into(),
            message: "body".into(),
            notification_type: NotificationType::Info,
            is_read: false,
            created_at: now(),
        }
    }

    #[test]
    fn mark_read_is_idempotent_and_owner_scoped() {
        let conn = open_memory_database().unwrap();
        let a = insert_test_user(&conn, "a", Role::Patient);
        let b = insert_test_user(&conn, "b", Role::Patient);
        let n = notification(a.id, "hello");
        insert_notification(&conn, &n).unwrap();

        assert!(!mark_notification_read(&conn, &n.id, &b.id).unwrap());
        assert_eq!(count_unread_notifications(&conn, &a.id).unwrap(), 1);

        assert!(mark_notification_read(&conn, &n.id, &a.id).unwrap());
        assert!(mark_notification_read(&conn, &n.id, &a.id).unwrap());
        assert_eq!(count_unread_notifications(&conn, &a.id).unwrap(), 0);
        assert_eq!(count_notifications(&conn, &a.id).unwrap(), 1);
    }

    #[test]
    fn mark_all_reports_flipped_rows() {
        let conn = open_memory_database().unwrap();
        let a = insert_test_user(&conn, "a", Role::Nurse);
        for i in 0..3 {
            insert_notification(&conn, &notification(a.id, &format!("n{i}"))).unwrap();
        }
        let unread = list_notifications(&conn, &a.id, true, Page::default()).unwrap();
        assert_eq!(unread.len(), 3);
        assert_eq!(unread[0].title, "n2");

        assert_eq!(mark_all_notifications_read(&conn, &a.id).unwrap(), 3);
        assert_eq!(mark_all_notifications_read(&conn, &a.id).unwrap(), 0);
        assert!(list_notifications(&conn, &a.id, true, Page::default()).unwrap().is_empty());
        assert_eq!(list_notifications(&conn, &a.id, false, Page::default()).unwrap().len(), 3);
    }
}
