use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::config::ForumConfig;
use crate::db::models::{Thread, User};
use crate::db::{format_time, now, parse_time, write_transaction};
use crate::error::{AppError, AppResult};
use crate::forum::ids::IdGenerator;
use crate::forum::slice::{DisplayOrder, Slice, SliceRequest};
use crate::forum::{authorship, tags, validate_content};

const THREAD_COLUMNS: &str =
    "t.id, t.seq, t.user_id, t.anonymous, t.author, t.title, t.content, t.main_tag, t.created_at";

#[derive(Debug, Clone, Default)]
pub struct NewThread {
    pub anonymous: bool,
    pub content: String,
    pub main_tag: String,
    pub sub_tags: Option<Vec<String>>,
    pub title: Option<String>,
}

fn thread_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        seq: row.get(1)?,
        user_id: row.get(2)?,
        anonymous: row.get(3)?,
        author: row.get(4)?,
        title: row.get(5)?,
        content: row.get(6)?,
        main_tag: row.get(7)?,
        sub_tags: Vec::new(),
        created_at: parse_time(&row.get::<_, String>(8)?)?,
    })
}

fn load_sub_tags(conn: &rusqlite::Connection, thread: &mut Thread) -> AppResult<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT tag FROM thread_tags WHERE thread_id = ?1 AND is_main = 0 ORDER BY position ASC",
    )?;
    thread.sub_tags = stmt
        .query_map(params![thread.id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(())
}

fn normalize_title(title: Option<&str>, forum: &ForumConfig) -> AppResult<String> {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok(forum.default_title.clone()),
        Some(t) if t.chars().count() > forum.max_title_len => Err(AppError::bad_request(format!(
            "title is longer than {} characters",
            forum.max_title_len
        ))),
        Some(t) => Ok(t.to_string()),
    }
}

pub fn create(
    conn: &rusqlite::Connection,
    ids: &IdGenerator,
    user: &User,
    input: NewThread,
    forum: &ForumConfig,
) -> AppResult<Thread> {
    let content = validate_content(&input.content, forum)?;
    let (main_tag, sub_tags) =
        tags::thread_tags(&input.main_tag, input.sub_tags.as_deref(), forum)?;
    let title = normalize_title(input.title.as_deref(), forum)?;

    let tx = write_transaction(conn)?;
    let (seq, id) = ids.next_id();
    let created_at = now();

    // A fresh thread has no anonymous ids yet, so one is minted up front.
    let author = if input.anonymous {
        authorship::fresh_anonymous_id(&tx)?
    } else {
        authorship::named_author(user)?
    };

    tx.execute(
        "INSERT INTO threads (id, seq, user_id, anonymous, author, title, content, main_tag, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            seq,
            user.id,
            input.anonymous,
            author,
            title,
            content,
            main_tag,
            format_time(&created_at)
        ],
    )?;
    if input.anonymous {
        tx.execute(
            "INSERT INTO anonymous_ids (thread_id, user_id, anonymous_id) VALUES (?1, ?2, ?3)",
            params![id, user.id, author],
        )?;
    }

    tx.execute(
        "INSERT INTO thread_tags (thread_id, tag, is_main, position) VALUES (?1, ?2, 1, 0)",
        params![id, main_tag],
    )?;
    for (i, tag) in sub_tags.iter().enumerate() {
        tx.execute(
            "INSERT INTO thread_tags (thread_id, tag, is_main, position) VALUES (?1, ?2, 0, ?3)",
            params![id, tag, i as i64 + 1],
        )?;
    }
    tx.commit()?;

    tracing::info!("Thread {} published under '{}'", id, main_tag);

    Ok(Thread {
        id,
        seq,
        user_id: user.id.clone(),
        anonymous: input.anonymous,
        author,
        title,
        content,
        main_tag,
        sub_tags,
        created_at,
    })
}

pub fn find(conn: &rusqlite::Connection, id: &str) -> AppResult<Option<Thread>> {
    let thread = conn
        .query_row(
            &format!("SELECT {} FROM threads t WHERE t.id = ?1", THREAD_COLUMNS),
            params![id],
            thread_from_row,
        )
        .optional()?;

    match thread {
        Some(mut thread) => {
            load_sub_tags(conn, &mut thread)?;
            Ok(Some(thread))
        }
        None => Ok(None),
    }
}

pub fn get(conn: &rusqlite::Connection, id: &str) -> AppResult<Thread> {
    find(conn, id)?.ok_or_else(|| AppError::not_found(format!("thread '{}'", id)))
}

/// Threads newest first. A non-empty `tags` keeps threads carrying any of
/// them as main or sub tag.
pub fn slice(
    conn: &rusqlite::Connection,
    tags: Option<&[String]>,
    req: &SliceRequest,
) -> AppResult<Slice<Thread>> {
    let tags: Vec<&str> = tags
        .unwrap_or_default()
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    let mut values = vec![Value::Integer(req.bound()), Value::Integer(req.limit)];
    let tag_filter = if tags.is_empty() {
        String::new()
    } else {
        let placeholders: Vec<String> = (0..tags.len()).map(|i| format!("?{}", i + 3)).collect();
        values.extend(tags.iter().map(|t| Value::Text(t.to_string())));
        format!(
            "AND EXISTS (SELECT 1 FROM thread_tags tt WHERE tt.thread_id = t.id AND tt.tag IN ({}))",
            placeholders.join(", ")
        )
    };

    let sql = format!(
        "SELECT {} FROM threads t WHERE t.seq {} ?1 {} ORDER BY t.seq {} LIMIT ?2",
        THREAD_COLUMNS,
        req.comparison(),
        tag_filter,
        req.sql_order()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut threads = stmt
        .query_map(params_from_iter(values.iter()), thread_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for thread in threads.iter_mut() {
        load_sub_tags(conn, thread)?;
    }

    Ok(req.finish(threads, DisplayOrder::NewestFirst, |t| t.seq))
}

pub fn reply_count(conn: &rusqlite::Connection, thread_id: &str) -> AppResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE thread_id = ?1",
        params![thread_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
