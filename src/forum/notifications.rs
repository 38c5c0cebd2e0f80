//! Notifications: operator announcements plus per-user replied and quoted
//! events.
//!
//! Replied events collapse into one notification per thread and quoted
//! events into one per quoted post. While unread, new events append their
//! author to the actor list; once read, the next event starts a fresh list.
//! Every event moves the notification to the front by giving it a new
//! sequence value, which is also what slice cursors refer to.

use rusqlite::{params, OptionalExtension};

use crate::db::models::{NotiKind, Notification, Post, SystemNotification, Thread};
use crate::db::{format_time, now, parse_time, write_transaction};
use crate::error::{AppError, AppResult};
use crate::forum::ids::{self, IdGenerator};
use crate::forum::slice::{DisplayOrder, Slice, SliceRequest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnreadCounts {
    pub system: i64,
    pub replied: i64,
    pub quoted: i64,
}

/// Raises the notifications caused by a new post. Authors are never
/// notified about their own actions.
pub fn record_post_events(
    conn: &rusqlite::Connection,
    ids: &IdGenerator,
    thread: &Thread,
    post: &Post,
    quoted: &[Post],
) -> AppResult<()> {
    if post.user_id != thread.user_id {
        record(conn, ids, &thread.user_id, NotiKind::Replied, &thread.id, "", &post.author)?;
    }
    for q in quoted {
        if q.user_id != post.user_id {
            record(conn, ids, &q.user_id, NotiKind::Quoted, &thread.id, &q.id, &post.author)?;
        }
    }
    Ok(())
}

fn record(
    conn: &rusqlite::Connection,
    ids: &IdGenerator,
    user_id: &str,
    kind: NotiKind,
    thread_id: &str,
    post_id: &str,
    actor: &str,
) -> AppResult<()> {
    let existing: Option<(String, String, bool)> = conn
        .query_row(
            "SELECT id, actors, has_read FROM notifications
             WHERE user_id = ?1 AND kind = ?2 AND thread_id = ?3 AND post_id = ?4",
            params![user_id, kind.as_str(), thread_id, post_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let seq = ids.next_seq();
    let event_time = format_time(&now());

    match existing {
        Some((id, actors, has_read)) => {
            let mut actors: Vec<String> = if has_read {
                Vec::new()
            } else {
                serde_json::from_str(&actors)?
            };
            if !actors.iter().any(|a| a == actor) {
                actors.push(actor.to_string());
            }
            conn.execute(
                "UPDATE notifications SET seq = ?1, actors = ?2, has_read = 0, event_time = ?3
                 WHERE id = ?4",
                params![seq, serde_json::to_string(&actors)?, event_time, id],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO notifications (id, seq, user_id, kind, thread_id, post_id, actors, has_read, event_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
                params![
                    ids::encode(seq),
                    seq,
                    user_id,
                    kind.as_str(),
                    thread_id,
                    post_id,
                    serde_json::to_string(&[actor])?,
                    event_time
                ],
            )?;
        }
    }

    tracing::debug!("{} notification for user {} on {}", kind, user_id, thread_id);
    Ok(())
}

/// Publishes an announcement visible to every user.
pub fn publish_system(
    conn: &rusqlite::Connection,
    ids: &IdGenerator,
    title: &str,
    content: &str,
) -> AppResult<SystemNotification> {
    let title = title.trim();
    let content = content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(AppError::bad_request(
            "announcements need a title and content",
        ));
    }

    let (seq, id) = ids.next_id();
    let event_time = now();
    conn.execute(
        "INSERT INTO system_notifications (id, seq, title, content, event_time)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, seq, title, content, format_time(&event_time)],
    )?;
    tracing::info!("System notification {} published", id);

    Ok(SystemNotification {
        id,
        seq,
        title: title.to_string(),
        content: content.to_string(),
        event_time,
        has_read: false,
    })
}

pub fn unread_counts(conn: &rusqlite::Connection, user_id: &str) -> AppResult<UnreadCounts> {
    let system = conn.query_row(
        "SELECT COUNT(*) FROM system_notifications s
         WHERE NOT EXISTS (
            SELECT 1 FROM system_notification_reads r
            WHERE r.user_id = ?1 AND r.notification_id = s.id
         )",
        params![user_id],
        |row| row.get(0),
    )?;

    let count_kind = |kind: NotiKind| -> rusqlite::Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND kind = ?2 AND has_read = 0",
            params![user_id, kind.as_str()],
            |row| row.get(0),
        )
    };

    Ok(UnreadCounts {
        system,
        replied: count_kind(NotiKind::Replied)?,
        quoted: count_kind(NotiKind::Quoted)?,
    })
}

/// Announcements newest first, reported with the user's read state before
/// this call; everything returned is marked read afterwards.
pub fn system_slice(
    conn: &rusqlite::Connection,
    user_id: &str,
    req: &SliceRequest,
) -> AppResult<Slice<SystemNotification>> {
    let sql = format!(
        "SELECT s.id, s.seq, s.title, s.content, s.event_time,
                EXISTS (SELECT 1 FROM system_notification_reads r
                        WHERE r.user_id = ?1 AND r.notification_id = s.id)
         FROM system_notifications s
         WHERE s.seq {} ?2 ORDER BY s.seq {} LIMIT ?3",
        req.comparison(),
        req.sql_order()
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params![user_id, req.bound(), req.limit], |row| {
            Ok(SystemNotification {
                id: row.get(0)?,
                seq: row.get(1)?,
                title: row.get(2)?,
                content: row.get(3)?,
                event_time: parse_time(&row.get::<_, String>(4)?)?,
                has_read: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let tx = write_transaction(conn)?;
    for item in items.iter().filter(|n| !n.has_read) {
        tx.execute(
            "INSERT OR IGNORE INTO system_notification_reads (user_id, notification_id) VALUES (?1, ?2)",
            params![user_id, item.id],
        )?;
    }
    tx.commit()?;

    Ok(req.finish(items, DisplayOrder::NewestFirst, |n| n.seq))
}

/// Replied or quoted notifications newest first. Same read semantics as
/// [`system_slice`].
pub fn event_slice(
    conn: &rusqlite::Connection,
    user_id: &str,
    kind: NotiKind,
    req: &SliceRequest,
) -> AppResult<Slice<Notification>> {
    if kind == NotiKind::System {
        return Err(AppError::Internal(
            "system notifications are sliced by system_slice".to_string(),
        ));
    }

    let sql = format!(
        "SELECT id, seq, user_id, thread_id, post_id, actors, has_read, event_time
         FROM notifications
         WHERE user_id = ?1 AND kind = ?2 AND seq {} ?3 ORDER BY seq {} LIMIT ?4",
        req.comparison(),
        req.sql_order()
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(
            params![user_id, kind.as_str(), req.bound(), req.limit],
            |row| {
                let actors: String = row.get(5)?;
                Ok(Notification {
                    id: row.get(0)?,
                    seq: row.get(1)?,
                    user_id: row.get(2)?,
                    kind,
                    thread_id: row.get(3)?,
                    post_id: row.get(4)?,
                    actors: serde_json::from_str(&actors).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            5,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                    has_read: row.get(6)?,
                    event_time: parse_time(&row.get::<_, String>(7)?)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let tx = write_transaction(conn)?;
    for item in items.iter().filter(|n| !n.has_read) {
        tx.execute(
            "UPDATE notifications SET has_read = 1 WHERE id = ?1",
            params![item.id],
        )?;
    }
    tx.commit()?;

    Ok(req.finish(items, DisplayOrder::NewestFirst, |n| n.seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForumConfig;
    use crate::db::models::User;
    use crate::db::test_support;
    use crate::forum::posts::{self, NewPost};
    use crate::forum::threads::{self, NewThread};
    use crate::forum::users;

    fn user(conn: &rusqlite::Connection, email: &str, name: &str) -> User {
        let user = users::upsert_by_email(conn, email).unwrap();
        users::set_name(conn, &user.id, name, &ForumConfig::default()).unwrap()
    }

    fn thread(conn: &rusqlite::Connection, ids: &IdGenerator, author: &User) -> Thread {
        let forum = ForumConfig::default();
        let input = NewThread {
            content: "topic".into(),
            main_tag: forum.main_tags[0].clone(),
            ..NewThread::default()
        };
        threads::create(conn, ids, author, input, &forum).unwrap()
    }

    fn reply(
        conn: &rusqlite::Connection,
        ids: &IdGenerator,
        author: &User,
        thread: &Thread,
        quotes: &[&str],
    ) -> Post {
        let input = NewPost {
            thread_id: thread.id.clone(),
            anonymous: false,
            content: "reply".into(),
            quotes: Some(quotes.iter().map(|q| q.to_string()).collect()),
        };
        posts::create(conn, ids, author, input, &ForumConfig::default()).unwrap()
    }

    fn first_page() -> SliceRequest {
        SliceRequest::new(Some(""), None, 20, 50).unwrap()
    }

    #[test]
    fn replies_aggregate_per_thread_until_read() {
        let (_tmp, pool) = test_support::pool();
        let conn = pool.get().unwrap();
        let ids = IdGenerator::new();
        let op = user(&conn, "op@example.org", "op");
        let bob = user(&conn, "bob@example.org", "bob");
        let eve = user(&conn, "eve@example.org", "eve");
        let t = thread(&conn, &ids, &op);

        reply(&conn, &ids, &bob, &t, &[]);
        reply(&conn, &ids, &eve, &t, &[]);
        reply(&conn, &ids, &bob, &t, &[]);
        reply(&conn, &ids, &op, &t, &[]);

        assert_eq!(unread_counts(&conn, &op.id).unwrap().replied, 1);
        assert_eq!(unread_counts(&conn, &bob.id).unwrap().replied, 0);

        let page = event_slice(&conn, &op.id, NotiKind::Replied, &first_page()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].actors, vec!["bob", "eve"]);
        assert!(!page.items[0].has_read);
        assert_eq!(page.items[0].thread_id, t.id);

        // fetching marked it read
        assert_eq!(unread_counts(&conn, &op.id).unwrap().replied, 0);
        let again = event_slice(&conn, &op.id, NotiKind::Replied, &first_page()).unwrap();
        assert!(again.items[0].has_read);

        // a new event after reading starts a fresh actor list
        reply(&conn, &ids, &eve, &t, &[]);
        let fresh = event_slice(&conn, &op.id, NotiKind::Replied, &first_page()).unwrap();
        assert_eq!(fresh.items[0].actors, vec!["eve"]);
        assert_eq!(fresh.items[0].id, page.items[0].id);
        assert!(fresh.items[0].seq > page.items[0].seq);
    }

    #[test]
    fn quotes_notify_the_quoted_author() {
        let (_tmp, pool) = test_support::pool();
        let conn = pool.get().unwrap();
        let ids = IdGenerator::new();
        let op = user(&conn, "op@example.org", "op");
        let bob = user(&conn, "bob@example.org", "bob");
        let t = thread(&conn, &ids, &op);

        let bobs = reply(&conn, &ids, &bob, &t, &[]);
        let ops = reply(&conn, &ids, &op, &t, &[bobs.id.as_str()]);
        // quoting yourself is silent
        reply(&conn, &ids, &bob, &t, &[bobs.id.as_str()]);
        reply(&conn, &ids, &bob, &t, &[ops.id.as_str()]);

        let counts = unread_counts(&conn, &bob.id).unwrap();
        assert_eq!(counts.quoted, 1);
        let page = event_slice(&conn, &bob.id, NotiKind::Quoted, &first_page()).unwrap();
        assert_eq!(page.items[0].post_id, bobs.id);
        assert_eq!(page.items[0].actors, vec!["op"]);

        assert_eq!(unread_counts(&conn, &op.id).unwrap().quoted, 1);
    }

    #[test]
    fn bumped_notifications_move_to_the_front() {
        let (_tmp, pool) = test_support::pool();
        let conn = pool.get().unwrap();
        let ids = IdGenerator::new();
        let op = user(&conn, "op@example.org", "op");
        let bob = user(&conn, "bob@example.org", "bob");
        let first = thread(&conn, &ids, &op);
        let second = thread(&conn, &ids, &op);

        reply(&conn, &ids, &bob, &first, &[]);
        reply(&conn, &ids, &bob, &second, &[]);
        reply(&conn, &ids, &bob, &first, &[]);

        let page = event_slice(&conn, &op.id, NotiKind::Replied, &first_page()).unwrap();
        let order: Vec<&str> = page.items.iter().map(|n| n.thread_id.as_str()).collect();
        assert_eq!(order, vec![first.id.as_str(), second.id.as_str()]);
        assert_eq!(page.first_cursor, ids::encode(page.items[0].seq));
    }

    #[test]
    fn system_notifications_track_reads_per_user() {
        let (_tmp, pool) = test_support::pool();
        let conn = pool.get().unwrap();
        let ids = IdGenerator::new();
        let alice = user(&conn, "alice@example.org", "alice");
        let bob = user(&conn, "bob@example.org", "bob");

        publish_system(&conn, &ids, "Welcome", "Be nice").unwrap();
        let latest = publish_system(&conn, &ids, "Maintenance", "Tonight").unwrap();
        assert!(publish_system(&conn, &ids, " ", "x").is_err());

        assert_eq!(unread_counts(&conn, &alice.id).unwrap().system, 2);

        let req = SliceRequest::new(Some(""), None, 1, 50).unwrap();
        let page = system_slice(&conn, &alice.id, &req).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, latest.id);
        assert!(!page.items[0].has_read);

        assert_eq!(unread_counts(&conn, &alice.id).unwrap().system, 1);
        assert_eq!(unread_counts(&conn, &bob.id).unwrap().system, 2);
    }

    #[test]
    fn event_slice_refuses_system_kind() {
        let (_tmp, pool) = test_support::pool();
        let conn = pool.get().unwrap();
        assert!(event_slice(&conn, "nobody", NotiKind::System, &first_page()).is_err());
    }
}
