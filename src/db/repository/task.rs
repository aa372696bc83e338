use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    date_at, datetime_at, enum_at, fmt_date, fmt_datetime, opt_datetime_at, opt_uuid_at, uuid_at,
    Conditions,
};
use crate::db::DatabaseError;
use crate::models::{Page, Task, TaskFilter, TaskStatus};

const TASK_COLUMNS: &str = "id, title, description, assigned_to, patient_id, priority,
     status, due_date, created_at, updated_at, completed_at";

pub fn insert_task(conn: &Connection, t: &Task) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO tasks (id, title, description, assigned_to, patient_id, priority,
         status, due_date, created_at, updated_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            t.id.to_string(),
            t.title,
            t.description,
            t.assigned_to.to_string(),
            t.patient_id.map(|id| id.to_string()),
            t.priority.as_str(),
            t.status.as_str(),
            fmt_date(&t.due_date),
            fmt_datetime(&t.created_at),
            fmt_datetime(&t.updated_at),
            t.completed_at.as_ref().map(fmt_datetime),
        ],
    )?;
    Ok(())
}

pub fn get_task(conn: &Connection, id: &Uuid) -> Result<Option<Task>, DatabaseError> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
    let task = conn
        .query_row(&sql, params![id.to_string()], row_to_task)
        .optional()?;
    Ok(task)
}

fn task_conditions(f: &TaskFilter) -> Conditions {
    let mut c = Conditions::default();
    if let Some(id) = f.assigned_to {
        c.push("assigned_to =", id.to_string());
    }
    if let Some(status) = f.status {
        c.push("status =", status.as_str().to_string());
    }
    if let Some(due) = f.due_date {
        c.push("due_date =", fmt_date(&due));
    }
    c
}

/// Most recently created first.
pub fn list_tasks(conn: &Connection, filter: &TaskFilter, page: Page) -> Result<Vec<Task>, DatabaseError> {
    let c = task_conditions(filter);
    let idx = c.next_index();
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE 1=1{}
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
        .query_map(params.as_slice(), row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_tasks(conn: &Connection, filter: &TaskFilter) -> Result<u32, DatabaseError> {
    let c = task_conditions(filter);
    let sql = format!("SELECT COUNT(*) FROM tasks WHERE 1=1{}", c.sql());
    let params = c.params_with(&[]);
    let count: u32 = conn.query_row(&sql, params.as_slice(), |row| row.get(0))?;
    Ok(count)
}

/// Compare-and-set on status. `completed_at` is stamped when moving to completed.
pub fn update_task_status(
    conn: &Connection,
    id: &Uuid,
    from: TaskStatus,
    to: TaskStatus,
) -> Result<bool, DatabaseError> {
    let now = fmt_datetime(&super::now());
    let completed_at = (to == TaskStatus::Completed).then(|| now.clone());
    let updated = conn.execute(
        "UPDATE tasks SET status = ?1, updated_at = ?2, completed_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![to.as_str(), now, completed_at, id.to_string(), from.as_str()],
    )?;
    Ok(updated == 1)
}

fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    Ok(Task {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        assigned_to: uuid_at(row, 3)?,
        patient_id: opt_uuid_at(row, 4)?,
        priority: enum_at(row, 5)?,
        status: enum_at(row, 6)?,
        due_date: date_at(row, 7)?,
        created_at: datetime_at(row, 8)?,
        updated_at: datetime_at(row, 9)?,
        completed_at: opt_datetime_at(row, 10)?,
    })
}
