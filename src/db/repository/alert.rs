use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{datetime_at, enum_at, fmt_datetime, uuid_at};
use crate::db::DatabaseError;
use crate::models::SystemAlert;

pub fn insert_system_alert(conn: &Connection, alert: &SystemAlert) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO system_alerts (id, title, message, alert_type, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            alert.id.to_string(),
            alert.title,
            alert.message,
            alert.alert_type.as_str(),
            alert.is_active as i32,
            fmt_datetime(&alert.created_at),
        ],
    )?;
    Ok(())
}

/// Active alerts, newest first, capped at `limit`.
pub fn list_active_system_alerts(conn: &Connection, limit: u32) -> Result<Vec<SystemAlert>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, message, alert_type, is_active, created_at
         FROM system_alerts WHERE is_active = 1
         ORDER BY created_at DESC, rowid DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(SystemAlert {
                id: uuid_at(row, 0)?,
                title: row.get(1)?,
                message: row.get(2)?,
                alert_type: enum_at(row, 3)?,
                is_active: row.get::<_, i32>(4)? != 0,
                created_at: datetime_at(row, 5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_active_system_alerts(conn: &Connection) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM system_alerts WHERE is_active = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn deactivate_system_alert(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE system_alerts SET is_active = 0 WHERE id = ?1",
        params![id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("SystemAlert", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::now;
    use crate::db::sqlite::open_memory_database;
    use crate::models::AlertType;

    fn alert(title: &str) -> SystemAlert {
        SystemAlert {
            id: Uuid::new_v4(),
            title: title.into(),
            message: "Scheduled maintenance".into(),
            alert_type: AlertType::Warning,
            is_active: true,
            created_at: now(),
        }
    }

    #[test]
    fn deactivated_alerts_leave_the_active_list() {
        let conn = open_memory_database().unwrap();
        let a = alert("one");
        insert_system_alert(&conn, &a).unwrap();
        insert_system_alert(&conn, &alert("two")).unwrap();
        assert_eq!(count_active_system_alerts(&conn).unwrap(), 2);

        deactivate_system_alert(&conn, &a.id).unwrap();
        let active = list_active_system_alerts(&conn, 5).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "two");
        assert_eq!(active[0].alert_type, AlertType::Warning);
    }

    #[test]
    fn deactivate_unknown_is_not_found() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            deactivate_system_alert(&conn, &Uuid::new_v4()),
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
