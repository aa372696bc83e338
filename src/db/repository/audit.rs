use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Insert a batch of audit entries into the audit_log table.
/// Tuple layout: (timestamp, user_id, action, status).
pub fn insert_audit_entries(
    conn: &Connection,
    entries: &[(String, Option<String>, String, String)],
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO audit_log (timestamp, user_id, action, status) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (timestamp, user_id, action, status) in entries {
        stmt.execute(params![timestamp, user_id, action, status])?;
    }
    Ok(())
}

/// Prune audit entries older than the given number of days.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < datetime('now', ?1)",
        params![format!("-{retention_days} days")],
    )?;
    Ok(deleted)
}

/// Most recent entries for one user: (timestamp, action, status).
pub fn query_audit_by_user(
    conn: &Connection,
    user_id: &str,
    limit: u32,
) -> Result<Vec<(String, String, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, action, status FROM audit_log
         WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![user_id, limit as i64], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
