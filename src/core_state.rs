//! Shared application state.
//!
//! `CoreState` is wrapped in `Arc` at startup and handed to the HTTP
//! layer. It owns the database location and the request audit buffer;
//! connections are opened per operation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::db;

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit rows older than this are pruned on flush.
const AUDIT_RETENTION_DAYS: i64 = 90;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    db_path: PathBuf,
    audit: AuditLogger,
}

impl CoreState {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            audit: AuditLogger::new(),
        }
    }

    /// Open a database connection, applying pending migrations.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Record a request outcome. Auto-flushes to DB when the buffer is full.
    pub fn log_access(&self, user_id: Option<Uuid>, action: &str, status: u16) {
        let needs_flush = self.audit.log(user_id, action, status);
        if needs_flush {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    /// Get the current audit buffer contents.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    /// Flush audit buffer to DB and prune entries past retention.
    pub fn flush_and_prune_audit(&self) -> Result<(), CoreError> {
        let conn = self.open_db()?;
        self.audit.flush_to_db(&conn)?;
        if let Err(e) = db::prune_audit_log(&conn, AUDIT_RETENTION_DAYS) {
            tracing::warn!("Failed to prune audit log: {e}");
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

/// One handled request.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: chrono::NaiveDateTime,
    /// `None` when the request never authenticated.
    pub user_id: Option<Uuid>,
    /// "METHOD /path"
    pub action: String,
    pub status: u16,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Returns `true` if the buffer has reached flush threshold.
    pub fn log(&self, user_id: Option<Uuid>, action: &str, status: u16) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: db::now(),
                user_id,
                action: action.to_string(),
                status,
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }

        let tuples: Vec<(String, Option<String>, String, String)> = entries
            .iter()
            .map(|e| {
                (
                    e.timestamp.format(db::DATETIME_FORMAT).to_string(),
                    e.user_id.map(|id| id.to_string()),
                    e.action.clone(),
                    e.status.to_string(),
                )
            })
            .collect();

        let count = tuples.len();
        db::insert_audit_entries(conn, &tuples)?;

        tracing::debug!(count, "Flushed audit entries to database");
        Ok(count)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_db_creates_and_migrates() {
        let tmp = tempfile::tempdir().unwrap();
        let state = CoreState::new(tmp.path().join("portal.db"));
        let conn = state.open_db().unwrap();
        assert_eq!(db::get_current_version(&conn), 2);
        assert!(state.db_path().exists());
    }

    #[test]
    fn audit_logger_signals_flush_at_capacity() {
        let logger = AuditLogger::new();
        for i in 0..AUDIT_BUFFER_CAPACITY - 1 {
            assert!(!logger.log(None, &format!("GET /api/{i}"), 200));
        }
        assert!(logger.log(None, "GET /api/last", 200));
        assert_eq!(logger.buffer_len(), AUDIT_BUFFER_CAPACITY);
        assert_eq!(logger.drain().len(), AUDIT_BUFFER_CAPACITY);
        assert_eq!(logger.buffer_len(), 0);
    }

    #[test]
    fn flush_writes_rows_and_empties_buffer() {
        let conn = db::open_memory_database().unwrap();
        let logger = AuditLogger::new();
        let user = Uuid::new_v4();
        logger.log(Some(user), "GET /api/tasks", 200);
        logger.log(None, "GET /api/dashboard", 401);

        assert_eq!(logger.flush_to_db(&conn).unwrap(), 2);
        assert_eq!(logger.flush_to_db(&conn).unwrap(), 0);

        let rows = db::query_audit_by_user(&conn, &user.to_string(), 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, "GET /api/tasks");
        assert_eq!(rows[0].2, "200");
    }

    #[test]
    fn log_access_auto_flushes_when_full() {
        let tmp = tempfile::tempdir().unwrap();
        let state = CoreState::new(tmp.path().join("portal.db"));
        for _ in 0..AUDIT_BUFFER_CAPACITY {
            state.log_access(None, "GET /api/health", 200);
        }
        assert!(state.audit_entries().is_empty());
        let conn = state.open_db().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count as usize, AUDIT_BUFFER_CAPACITY);
    }
}
