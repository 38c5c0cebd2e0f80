use rusqlite::{params, OptionalExtension};

use crate::config::ForumConfig;
use crate::db::models::{Post, User};
use crate::db::{format_time, now, parse_time, write_transaction};
use crate::error::{AppError, AppResult};
use crate::forum::ids::IdGenerator;
use crate::forum::slice::{DisplayOrder, Slice, SliceRequest};
use crate::forum::{authorship, notifications, threads, validate_content};

const POST_COLUMNS: &str =
    "p.id, p.seq, p.thread_id, p.user_id, p.anonymous, p.author, p.content, p.created_at";

#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub thread_id: String,
    pub anonymous: bool,
    pub content: String,
    pub quotes: Option<Vec<String>>,
}

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        seq: row.get(1)?,
        thread_id: row.get(2)?,
        user_id: row.get(3)?,
        anonymous: row.get(4)?,
        author: row.get(5)?,
        content: row.get(6)?,
        created_at: parse_time(&row.get::<_, String>(7)?)?,
    })
}

/// Publishes a reply and raises the replied/quoted notifications it causes.
pub fn create(
    conn: &rusqlite::Connection,
    ids: &IdGenerator,
    user: &User,
    input: NewPost,
    forum: &ForumConfig,
) -> AppResult<Post> {
    let content = validate_content(&input.content, forum)?;
    let thread = threads::get(conn, input.thread_id.trim())?;

    let mut quote_ids: Vec<String> = Vec::new();
    for id in input.quotes.unwrap_or_default() {
        let id = id.trim().to_string();
        if !quote_ids.contains(&id) {
            quote_ids.push(id);
        }
    }
    if quote_ids.len() > forum.max_quotes {
        return Err(AppError::bad_request(format!(
            "at most {} posts can be quoted",
            forum.max_quotes
        )));
    }
    let mut quoted = Vec::with_capacity(quote_ids.len());
    for id in &quote_ids {
        match find(conn, id)? {
            Some(post) if post.thread_id == thread.id => quoted.push(post),
            _ => {
                return Err(AppError::bad_request(format!(
                    "quoted post '{}' does not exist in this thread",
                    id
                )))
            }
        }
    }

    let tx = write_transaction(conn)?;
    let author = authorship::author_for(&tx, &thread.id, user, input.anonymous)?;
    let (seq, id) = ids.next_id();
    let created_at = now();

    tx.execute(
        "INSERT INTO posts (id, seq, thread_id, user_id, anonymous, author, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            seq,
            thread.id,
            user.id,
            input.anonymous,
            author,
            content,
            format_time(&created_at)
        ],
    )?;
    for (position, quoted_post) in quoted.iter().enumerate() {
        tx.execute(
            "INSERT INTO post_quotes (post_id, quoted_id, position) VALUES (?1, ?2, ?3)",
            params![id, quoted_post.id, position as i64],
        )?;
    }

    let post = Post {
        id,
        seq,
        thread_id: thread.id.clone(),
        user_id: user.id.clone(),
        anonymous: input.anonymous,
        author,
        content,
        created_at,
    };
    notifications::record_post_events(&tx, ids, &thread, &post, &quoted)?;
    tx.commit()?;

    tracing::debug!("Post {} published in thread {}", post.id, thread.id);
    Ok(post)
}

pub fn find(conn: &rusqlite::Connection, id: &str) -> AppResult<Option<Post>> {
    let post = conn
        .query_row(
            &format!("SELECT {} FROM posts p WHERE p.id = ?1", POST_COLUMNS),
            params![id],
            post_from_row,
        )
        .optional()?;
    Ok(post)
}

pub fn get(conn: &rusqlite::Connection, id: &str) -> AppResult<Post> {
    find(conn, id)?.ok_or_else(|| AppError::not_found(format!("post '{}'", id)))
}

/// Replies of a thread, oldest first.
pub fn replies(
    conn: &rusqlite::Connection,
    thread_id: &str,
    req: &SliceRequest,
) -> AppResult<Slice<Post>> {
    let sql = format!(
        "SELECT {} FROM posts p WHERE p.thread_id = ?1 AND p.seq {} ?2 ORDER BY p.seq {} LIMIT ?3",
        POST_COLUMNS,
        req.comparison(),
        req.sql_order()
    );
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params![thread_id, req.bound(), req.limit], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(req.finish(posts, DisplayOrder::OldestFirst, |p| p.seq))
}

/// Posts quoted by `post_id`, in the order they were quoted.
pub fn quotes_of(conn: &rusqlite::Connection, post_id: &str) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM post_quotes q JOIN posts p ON p.id = q.quoted_id
         WHERE q.post_id = ?1 ORDER BY q.position ASC",
        POST_COLUMNS
    ))?;
    let posts = stmt
        .query_map(params![post_id], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// Number of posts quoting `post_id`.
pub fn quote_count(conn: &rusqlite::Connection, post_id: &str) -> AppResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM post_quotes WHERE quoted_id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
