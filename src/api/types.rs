//! Shared types for the HTTP layer.

use std::sync::Arc;

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::Actor;
use crate::config::PAGE_SIZE;
use crate::core_state::CoreState;
use crate::db::{self, DatabaseError};
use crate::models::{Page, Role};

// ═══════════════════════════════════════════════════════════
// API context: shared state for router and middleware
// ═══════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

// ═══════════════════════════════════════════════════════════
// User context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// The authenticated caller, injected into request extensions
/// once the bearer token resolves to an active user.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: Uuid,
    pub role: Role,
    pub name: String,
}

impl UserContext {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

// ═══════════════════════════════════════════════════════════
// Bearer tokens
// ═══════════════════════════════════════════════════════════

/// SHA-256 of a bearer token, hex encoded. Only this form is stored.
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Create and store a new token for `user_id`. The plaintext is returned once.
pub fn issue_token(conn: &Connection, user_id: &Uuid) -> Result<String, DatabaseError> {
    let token = generate_token();
    db::insert_access_token(conn, &hash_token(&token), user_id)?;
    tracing::info!(user_id = %user_id, "Access token issued");
    Ok(token)
}

// ═══════════════════════════════════════════════════════════
// Query helpers
// ═══════════════════════════════════════════════════════════

/// `?page=N&page_size=M`, 1-based.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        let size = self.page_size.unwrap_or(PAGE_SIZE).clamp(1, 100);
        Page::new(self.page.unwrap_or(1), size)
    }
}
