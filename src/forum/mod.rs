//! Forum domain: users, threads, posts, notifications and tags, stored in
//! SQLite. Functions take a plain connection so callers decide pooling and
//! transactions.

pub mod authorship;
pub mod ids;
pub mod notifications;
pub mod posts;
pub mod slice;
pub mod tags;
pub mod threads;
pub mod users;

use crate::config::ForumConfig;
use crate::error::{AppError, AppResult};

/// Trims thread and post bodies and checks them against the length limit.
pub fn validate_content(content: &str, forum: &ForumConfig) -> AppResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::bad_request("content must not be blank"));
    }
    if content.chars().count() > forum.max_content_len {
        return Err(AppError::bad_request(format!(
            "content is longer than {} characters",
            forum.max_content_len
        )));
    }
    Ok(content.to_string())
}
