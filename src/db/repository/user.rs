use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{datetime_at, enum_at, fmt_date, fmt_datetime, opt_date_at, uuid_at, Conditions};
use crate::db::DatabaseError;
use crate::models::{Page, Role, User, UserFilter};

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, role, phone,
     date_of_birth, address, is_active, created_at, updated_at";

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, username, first_name, last_name, email, role, phone,
         date_of_birth, address, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            user.id.to_string(),
            user.username,
            user.first_name,
            user.last_name,
            user.email,
            user.role.as_str(),
            user.phone,
            user.date_of_birth.as_ref().map(fmt_date),
            user.address,
            user.is_active as i32,
            fmt_datetime(&user.created_at),
            fmt_datetime(&user.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let user = conn
        .query_row(&sql, params![id.to_string()], row_to_user)
        .optional()?;
    Ok(user)
}

pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
    let user = conn
        .query_row(&sql, params![username], row_to_user)
        .optional()?;
    Ok(user)
}

fn user_conditions(filter: &UserFilter) -> Conditions {
    let mut c = Conditions::default();
    if let Some(role) = filter.role {
        c.push("role =", role.as_str().to_string());
    }
    if filter.active_only {
        c.push_raw("is_active = 1");
    }
    c
}

/// Newest accounts first.
pub fn list_users(
    conn: &Connection,
    filter: &UserFilter,
    page: Page,
) -> Result<Vec<User>, DatabaseError> {
    let c = user_conditions(filter);
    let idx = c.next_index();
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE 1=1{}
         ORDER BY created_at DESC, username ASC LIMIT ?{idx} OFFSET ?{}",
        c.sql(),
        idx + 1
    );
    let limit = page.limit as i64;
    let offset = page.offset as i64;
    let paging: [&dyn ToSql; 2] = [&limit, &offset];
    let params = c.params_with(&paging);
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map(params.as_slice(), row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn count_users(conn: &Connection, filter: &UserFilter) -> Result<u32, DatabaseError> {
    let c = user_conditions(filter);
    let sql = format!("SELECT COUNT(*) FROM users WHERE 1=1{}", c.sql());
    let params = c.params_with(&[]);
    let count: u32 = conn.query_row(&sql, params.as_slice(), |row| row.get(0))?;
    Ok(count)
}

pub fn set_user_active(conn: &Connection, id: &Uuid, active: bool) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        params![active as i32, fmt_datetime(&super::now()), id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("User", id));
    }
    Ok(())
}

/// Persist the editable contact fields of an existing user.
pub fn update_user_contact(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3, phone = ?4,
         date_of_birth = ?5, address = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            user.first_name,
            user.last_name,
            user.email,
            user.phone,
            user.date_of_birth.as_ref().map(fmt_date),
            user.address,
            fmt_datetime(&user.updated_at),
            user.id.to_string(),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("User", user.id));
    }
    Ok(())
}

/// Removing a user cascades to every row that references it.
pub fn delete_user(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
    Ok(())
}

/// Check that `id` names an active user holding one of `roles`.
pub fn user_has_role(conn: &Connection, id: &Uuid, roles: &[Role]) -> Result<bool, DatabaseError> {
    Ok(get_user(conn, id)?
        .map(|u| u.is_active && roles.contains(&u.role))
        .unwrap_or(false))
}

pub(crate) fn row_to_user(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        role: enum_at(row, 5)?,
        phone: row.get(6)?,
        date_of_birth: opt_date_at(row, 7)?,
        address: row.get(8)?,
        is_active: row.get::<_, i32>(9)? != 0,
        created_at: datetime_at(row, 10)?,
        updated_at: datetime_at(row, 11)?,
    })
}

/// Minimal user row for repository tests.
#[cfg(test)]
pub(crate) fn insert_test_user(conn: &Connection, username: &str, role: Role) -> User {
    let now = super::now();
    let user = User {
        id: Uuid::new_v4(),
        username: username.into(),
        first_name: username.into(),
        last_name: "Test".into(),
        email: format!("{username}@medora.test"),
        role,
        phone: None,
        date_of_birth: None,
        address: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    insert_user(conn, &user).unwrap();
    user
}
