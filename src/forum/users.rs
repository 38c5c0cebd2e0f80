use rusqlite::{params, OptionalExtension};

use crate::config::ForumConfig;
use crate::db::models::User;
use crate::db::write_transaction;
use crate::error::{AppError, AppResult};
use crate::forum::{ids, tags};

pub fn find(conn: &rusqlite::Connection, user_id: &str) -> AppResult<Option<User>> {
    let row: Option<(String, String, Option<String>)> = conn
        .query_row(
            "SELECT id, email, name FROM users WHERE id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    match row {
        Some((id, email, name)) => {
            let tags = subscribed_tags(conn, &id)?;
            Ok(Some(User {
                id,
                email,
                name,
                tags,
            }))
        }
        None => Ok(None),
    }
}

pub fn get(conn: &rusqlite::Connection, user_id: &str) -> AppResult<User> {
    find(conn, user_id)?.ok_or_else(|| AppError::not_found("user"))
}

fn subscribed_tags(conn: &rusqlite::Connection, user_id: &str) -> AppResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT tag FROM user_tags WHERE user_id = ?1 ORDER BY position ASC")?;
    let tags = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tags)
}

/// Lower-cased, trimmed address of the form `local@domain.tld`.
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    let invalid = || AppError::bad_request(format!("'{}' is not a valid email address", email));

    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(email)
}

/// Registers the address on first use, otherwise returns the existing user.
pub fn upsert_by_email(conn: &rusqlite::Connection, email: &str) -> AppResult<User> {
    let email = normalize_email(email)?;
    let created = conn.execute(
        "INSERT OR IGNORE INTO users (id, email) VALUES (?1, ?2)",
        params![uuid::Uuid::now_v7().to_string(), email],
    )?;
    if created > 0 {
        tracing::info!("Registered new user {}", email);
    }

    let id: String = conn.query_row(
        "SELECT id FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    get(conn, &id)
}

pub fn set_name(
    conn: &rusqlite::Connection,
    user_id: &str,
    name: &str,
    forum: &ForumConfig,
) -> AppResult<User> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be blank"));
    }
    if name.chars().count() > forum.max_name_len {
        return Err(AppError::bad_request(format!(
            "name is longer than {} characters",
            forum.max_name_len
        )));
    }
    // Would be indistinguishable from an anonymous author.
    if ids::looks_like_id(name) {
        return Err(AppError::bad_request("name cannot look like an anonymous id"));
    }

    let tx = write_transaction(conn)?;
    let taken: Option<String> = tx
        .query_row(
            "SELECT id FROM users WHERE name = ?1 AND id != ?2",
            params![name, user_id],
            |row| row.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(AppError::Conflict(format!("name '{}' is already taken", name)));
    }

    let updated = tx.execute(
        "UPDATE users SET name = ?1 WHERE id = ?2",
        params![name, user_id],
    )?;
    if updated == 0 {
        return Err(AppError::not_found("user"));
    }
    tx.commit()?;
    get(conn, user_id)
}

/// Replaces the subscribed tags. Null and blank entries are dropped.
pub fn sync_tags(
    conn: &rusqlite::Connection,
    user_id: &str,
    tags: &[Option<String>],
    forum: &ForumConfig,
) -> AppResult<User> {
    let wanted = tags::normalize_tags(
        tags.iter()
            .flatten()
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty()),
        forum.max_tag_len,
    )?;
    write_tags(conn, user_id, &wanted, forum)
}

pub fn add_tags(
    conn: &rusqlite::Connection,
    user_id: &str,
    tags: &[String],
    forum: &ForumConfig,
) -> AppResult<User> {
    let mut current = get(conn, user_id)?.tags;
    for tag in tags::normalize_tags(tags.iter().map(String::as_str), forum.max_tag_len)? {
        if !current.contains(&tag) {
            current.push(tag);
        }
    }
    write_tags(conn, user_id, &current, forum)
}

pub fn del_tags(
    conn: &rusqlite::Connection,
    user_id: &str,
    tags: &[String],
    forum: &ForumConfig,
) -> AppResult<User> {
    let remove: Vec<&str> = tags.iter().map(|t| t.trim()).collect();
    let mut current = get(conn, user_id)?.tags;
    current.retain(|t| !remove.contains(&t.as_str()));
    write_tags(conn, user_id, &current, forum)
}

fn write_tags(
    conn: &rusqlite::Connection,
    user_id: &str,
    tags: &[String],
    forum: &ForumConfig,
) -> AppResult<User> {
    if tags.len() > forum.max_subbed_tags {
        return Err(AppError::bad_request(format!(
            "at most {} tags can be subscribed",
            forum.max_subbed_tags
        )));
    }

    let tx = write_transaction(conn)?;
    tx.execute("DELETE FROM user_tags WHERE user_id = ?1", params![user_id])?;
    for (position, tag) in tags.iter().enumerate() {
        tx.execute(
            "INSERT INTO user_tags (user_id, tag, position) VALUES (?1, ?2, ?3)",
            params![user_id, tag, position as i64],
        )?;
    }
    tx.commit()?;

    get(conn, user_id)
}
