use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{fmt_datetime, row_to_user};
use crate::db::DatabaseError;
use crate::models::User;

/// Store the SHA-256 hash of a freshly issued bearer token.
pub fn insert_access_token(conn: &Connection, token_hash: &str, user_id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO access_tokens (token_hash, user_id, created_at, revoked)
         VALUES (?1, ?2, ?3, 0)",
        params![token_hash, user_id.to_string(), fmt_datetime(&super::now())],
    )?;
    Ok(())
}

/// Resolve a token hash to its owner. Revoked tokens resolve to nothing.
pub fn find_user_by_token(conn: &Connection, token_hash: &str) -> Result<Option<User>, DatabaseError> {
    let user = conn
        .query_row(
            "SELECT u.id, u.username, u.first_name, u.last_name, u.email, u.role, u.phone,
                    u.date_of_birth, u.address, u.is_active, u.created_at, u.updated_at
             FROM access_tokens t JOIN users u ON u.id = t.user_id
             WHERE t.token_hash = ?1 AND t.revoked = 0",
            params![token_hash],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Revoke every live token of a user. Returns the number revoked.
pub fn revoke_user_tokens(conn: &Connection, user_id: &Uuid) -> Result<usize, DatabaseError> {
    let revoked = conn.execute(
        "UPDATE access_tokens SET revoked = 1 WHERE user_id = ?1 AND revoked = 0",
        params![user_id.to_string()],
    )?;
    Ok(revoked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_test_user;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;

    #[test]
    fn token_resolves_until_revoked() {
        let conn = open_memory_database().unwrap();
        let u = insert_test_user(&conn, "u", Role::Doctor);
        insert_access_token(&conn, "hash-1", &u.id).unwrap();

        let found = find_user_by_token(&conn, "hash-1").unwrap().unwrap();
        assert_eq!(found.id, u.id);
        assert!(find_user_by_token(&conn, "hash-2").unwrap().is_none());

        assert_eq!(revoke_user_tokens(&conn, &u.id).unwrap(), 1);
        assert!(find_user_by_token(&conn, "hash-1").unwrap().is_none());
    }
}
