//! Who a thread or post is displayed as.
//!
//! Named authors show the user's name. Anonymous authors show an id that is
//! stable for one user within one thread and unrelated across threads.

use rusqlite::{params, OptionalExtension};

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::forum::ids;

const MAX_ATTEMPTS: usize = 8;

pub fn named_author(user: &User) -> AppResult<String> {
    user.name
        .clone()
        .ok_or_else(|| AppError::bad_request("set a name before posting non-anonymously"))
}

/// An anonymous id not used by anyone in any thread yet.
pub fn fresh_anonymous_id(conn: &rusqlite::Connection) -> AppResult<String> {
    for _ in 0..MAX_ATTEMPTS {
        let candidate = ids::anonymous_id();
        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM anonymous_ids WHERE anonymous_id = ?1",
            params![candidate],
            |row| row.get(0),
        )?;
        if !taken {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal(
        "could not allocate an anonymous id".to_string(),
    ))
}

/// The user's anonymous id in a thread, minted on first use.
pub fn anonymous_id(
    conn: &rusqlite::Connection,
    thread_id: &str,
    user_id: &str,
) -> AppResult<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT anonymous_id FROM anonymous_ids WHERE thread_id = ?1 AND user_id = ?2",
            params![thread_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = fresh_anonymous_id(conn)?;
    conn.execute(
        "INSERT INTO anonymous_ids (thread_id, user_id, anonymous_id) VALUES (?1, ?2, ?3)",
        params![thread_id, user_id, id],
    )?;
    Ok(id)
}

pub fn author_for(
    conn: &rusqlite::Connection,
    thread_id: &str,
    user: &User,
    anonymous: bool,
) -> AppResult<String> {
    if anonymous {
        anonymous_id(conn, thread_id, &user.id)
    } else {
        named_author(user)
    }
}
