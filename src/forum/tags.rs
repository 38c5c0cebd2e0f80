use std::collections::HashMap;

use crate::config::ForumConfig;
use crate::error::{AppError, AppResult};

/// A main tag with the sub tags threads have used alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNode {
    pub main_tag: String,
    pub sub_tags: Vec<String>,
}

pub fn normalize_tag(tag: &str, max_len: usize) -> AppResult<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(AppError::bad_request("tags must not be blank"));
    }
    if tag.chars().count() > max_len {
        return Err(AppError::bad_request(format!(
            "tag '{}' is longer than {} characters",
            tag, max_len
        )));
    }
    Ok(tag.to_string())
}

/// Trims and validates every tag, keeping the first occurrence of duplicates.
pub fn normalize_tags<'a>(
    tags: impl IntoIterator<Item = &'a str>,
    max_len: usize,
) -> AppResult<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = normalize_tag(tag, max_len)?;
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    Ok(out)
}

/// Validates the tags of a new thread. Returns the main tag and the sub tags.
pub fn thread_tags(
    main_tag: &str,
    sub_tags: Option<&[String]>,
    forum: &ForumConfig,
) -> AppResult<(String, Vec<String>)> {
    let main_tag = main_tag.trim();
    if !forum.main_tags.iter().any(|t| t == main_tag) {
        return Err(AppError::bad_request(format!(
            "'{}' is not a main tag",
            main_tag
        )));
    }

    let sub_tags = normalize_tags(
        sub_tags.unwrap_or_default().iter().map(String::as_str),
        forum.max_tag_len,
    )?;
    if sub_tags.len() > forum.max_sub_tags {
        return Err(AppError::bad_request(format!(
            "at most {} sub tags are allowed",
            forum.max_sub_tags
        )));
    }
    if sub_tags.iter().any(|t| t == main_tag) {
        return Err(AppError::bad_request(
            "the main tag cannot also be a sub tag",
        ));
    }

    Ok((main_tag.to_string(), sub_tags))
}

/// One node per configured main tag, sub tags ordered by how often they
/// were used with it.
pub fn tag_tree(
    conn: &rusqlite::Connection,
    forum: &ForumConfig,
    query: Option<&str>,
) -> AppResult<Vec<TagNode>> {
    let mut stmt = conn.prepare(
        "SELECT m.tag, s.tag, COUNT(*) AS uses
         FROM thread_tags m
         JOIN thread_tags s ON s.thread_id = m.thread_id AND s.is_main = 0
         WHERE m.is_main = 1
         GROUP BY m.tag, s.tag
         ORDER BY uses DESC, s.tag ASC",
    )?;

    let mut used: HashMap<String, Vec<String>> = HashMap::new();
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (main, sub) = row?;
        used.entry(main).or_default().push(sub);
    }

    let needle = query
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    let nodes = forum
        .main_tags
        .iter()
        .filter_map(|main| {
            let mut subs = used.remove(main).unwrap_or_default();
            if let Some(needle) = &needle {
                if !main.to_lowercase().contains(needle.as_str()) {
                    subs.retain(|s| s.to_lowercase().contains(needle.as_str()));
                    if subs.is_empty() {
                        return None;
                    }
                }
            }
            subs.truncate(forum.tree_sub_tag_limit);
            Some(TagNode {
                main_tag: main.clone(),
                sub_tags: subs,
            })
        })
        .collect();

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use rusqlite::params;

    fn forum() -> ForumConfig {
        ForumConfig {
            main_tags: vec!["tech".into(), "life".into()],
            ..ForumConfig::default()
        }
    }

    fn tag_thread(conn: &rusqlite::Connection, id: &str, seq: i64, main: &str, subs: &[&str]) {
        conn.execute(
            "INSERT INTO threads (id, seq, user_id, anonymous, author, title, content, main_tag, created_at)
             VALUES (?1, ?2, 'u1', 0, 'alice', 't', 'c', ?3, '2024-01-01T00:00:00.000Z')",
            params![id, seq, main],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO thread_tags (thread_id, tag, is_main, position) VALUES (?1, ?2, 1, 0)",
            params![id, main],
        )
        .unwrap();
        for (i, sub) in subs.iter().enumerate() {
            conn.execute(
                "INSERT INTO thread_tags (thread_id, tag, is_main, position) VALUES (?1, ?2, 0, ?3)",
                params![id, sub, i as i64 + 1],
            )
            .unwrap();
        }
    }

    #[test]
    fn normalize_trims_and_dedupes() {
        let tags = normalize_tags([" rust", "go", "rust ", "go"], 32).unwrap();
        assert_eq!(tags, vec!["rust", "go"]);
    }

    #[test]
    fn normalize_rejects_blank_and_long_tags() {
        assert!(normalize_tag("   ", 32).is_err());
        assert!(normalize_tag(&"x".repeat(33), 32).is_err());
        assert_eq!(normalize_tag(&"标".repeat(32), 32).unwrap().chars().count(), 32);
    }

    #[test]
    fn thread_tags_allows_four_sub_tags() {
        let subs: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let (main, sub_tags) = thread_tags("tech", Some(&subs), &forum()).unwrap();
        assert_eq!(main, "tech");
        assert_eq!(sub_tags.len(), 4);
    }

    #[test]
    fn thread_tags_rejects_fifth_sub_tag() {
        let subs: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        assert!(thread_tags("tech", Some(&subs), &forum()).is_err());
    }

    #[test]
    fn thread_tags_counts_after_dedup() {
        let subs: Vec<String> = ["a", "b", "c", "d", "a"].iter().map(|s| s.to_string()).collect();
        let (_, sub_tags) = thread_tags("tech", Some(&subs), &forum()).unwrap();
        assert_eq!(sub_tags, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn thread_tags_requires_known_main_tag() {
        assert!(thread_tags("cooking", None, &forum()).is_err());
        assert!(thread_tags("tech", Some(&["tech".to_string()]), &forum()).is_err());
    }

    #[test]
    fn tree_orders_sub_tags_by_use() {
        let (_tmp, pool) = test_support::pool();
        let conn = pool.get().unwrap();
        test_support::insert_user(&conn, "u1", Some("alice"));
        tag_thread(&conn, "t1", 1, "tech", &["rust", "go"]);
        tag_thread(&conn, "t2", 2, "tech", &["rust"]);
        tag_thread(&conn, "t3", 3, "life", &["food"]);

        let tree = tag_tree(&conn, &forum(), None).unwrap();
        assert_eq!(
            tree,
            vec![
                TagNode {
                    main_tag: "tech".into(),
                    sub_tags: vec!["rust".into(), "go".into()],
                },
                TagNode {
                    main_tag: "life".into(),
                    sub_tags: vec!["food".into()],
                },
            ]
        );
    }

    #[test]
    fn tree_query_filters_nodes_and_sub_tags() {
        let (_tmp, pool) = test_support::pool();
        let conn = pool.get().unwrap();
        test_support::insert_user(&conn, "u1", Some("alice"));
        tag_thread(&conn, "t1", 1, "tech", &["Rust", "go"]);
        tag_thread(&conn, "t2", 2, "life", &["food"]);

        let tree = tag_tree(&conn, &forum(), Some("rus")).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].main_tag, "tech");
        assert_eq!(tree[0].sub_tags, vec!["Rust"]);

        // matching the main tag keeps the whole node
        let tree = tag_tree(&conn, &forum(), Some("LIF")).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].sub_tags, vec!["food"]);
    }

    #[test]
    fn tree_lists_unused_main_tags() {
        let (_tmp, pool) = test_support::pool();
        let conn = pool.get().unwrap();
        let tree = tag_tree(&conn, &forum(), Some("  ")).unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.iter().all(|n| n.sub_tags.is_empty()));
    }
}
