use chrono::Duration;
use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::{format_time, now};
use crate::error::AppResult;

/// Create a new session for a user. Returns the session token.
pub fn create_session(conn: &rusqlite::Connection, user_id: &str, hours: u64) -> AppResult<String> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    let expires_at = now() + Duration::hours(hours as i64);

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, user_id, token, format_time(&expires_at)],
    )?;

    Ok(token)
}

/// User id behind a live session token.
pub fn session_user(conn: &rusqlite::Connection, token: &str) -> AppResult<Option<String>> {
    let user_id = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > ?2",
            params![token, format_time(&now())],
            |row| row.get(0),
        )
        .optional()?;
    Ok(user_id)
}

/// Delete a session by token.
pub fn delete_session(conn: &rusqlite::Connection, token: &str) -> AppResult<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
pub(crate) fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
