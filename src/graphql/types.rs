use async_graphql::*;

use crate::config::ForumConfig;
use crate::db::models;
use crate::error::AppResult;
use crate::forum::slice::{Slice, SliceRequest};
use crate::forum::{posts, tags, threads};
use crate::graphql::scalars::Time;
use crate::graphql::{conn, forum, to_int};

// -- Inputs --

/// Selects a slice of an ordered list. Affects the returned SliceInfo.
#[derive(InputObject, Debug, Clone)]
pub struct SliceQuery {
    /// Walk towards older items. Either this or `after` is required; an
    /// empty string starts from the newest end.
    pub before: Option<String>,
    /// Walk towards newer items. Either this or `before` is required; an
    /// empty string starts from the oldest end.
    pub after: Option<String>,
    /// Number of items to return.
    pub limit: i32,
}

impl SliceQuery {
    pub fn request(&self, forum: &ForumConfig) -> AppResult<SliceRequest> {
        SliceRequest::new(
            self.before.as_deref(),
            self.after.as_deref(),
            self.limit,
            forum.max_slice_limit,
        )
    }
}

/// A post to be published.
#[derive(InputObject, Debug, Clone)]
pub struct PostInput {
    #[graphql(name = "threadID")]
    pub thread_id: String,
    pub anonymous: bool,
    pub content: String,
    /// Ids of posts in the same thread being quoted.
    pub quotes: Option<Vec<String>>,
}

impl From<PostInput> for posts::NewPost {
    fn from(input: PostInput) -> Self {
        posts::NewPost {
            thread_id: input.thread_id,
            anonymous: input.anonymous,
            content: input.content,
            quotes: input.quotes,
        }
    }
}

/// A thread to be published.
#[derive(InputObject, Debug, Clone)]
pub struct ThreadInput {
    /// Post under a per-thread anonymous id instead of the user's name.
    pub anonymous: bool,
    pub content: String,
    /// Exactly one of the configured main tags.
    pub main_tag: String,
    /// At most 4.
    pub sub_tags: Option<Vec<String>>,
    /// Defaults to '无题' when absent or blank.
    pub title: Option<String>,
}

impl From<ThreadInput> for threads::NewThread {
    fn from(input: ThreadInput) -> Self {
        threads::NewThread {
            anonymous: input.anonymous,
            content: input.content,
            main_tag: input.main_tag,
            sub_tags: input.sub_tags,
            title: input.title,
        }
    }
}

// -- Slices --

/// Generated by the server; feed the cursors back into the next SliceQuery.
#[derive(SimpleObject, Debug, Clone, Default)]
pub struct SliceInfo {
    pub first_cursor: String,
    pub last_cursor: String,
}

impl<T> From<&Slice<T>> for SliceInfo {
    fn from(slice: &Slice<T>) -> Self {
        SliceInfo {
            first_cursor: slice.first_cursor.clone(),
            last_cursor: slice.last_cursor.clone(),
        }
    }
}

#[derive(SimpleObject)]
pub struct PostSlice {
    pub posts: Vec<Post>,
    pub slice_info: SliceInfo,
}

impl From<Slice<models::Post>> for PostSlice {
    fn from(slice: Slice<models::Post>) -> Self {
        let slice = slice.map(Post);
        PostSlice {
            slice_info: SliceInfo::from(&slice),
            posts: slice.items,
        }
    }
}

#[derive(SimpleObject)]
pub struct ThreadSlice {
    pub threads: Vec<Thread>,
    pub slice_info: SliceInfo,
}

impl From<Slice<models::Thread>> for ThreadSlice {
    fn from(slice: Slice<models::Thread>) -> Self {
        let slice = slice.map(Thread);
        ThreadSlice {
            slice_info: SliceInfo::from(&slice),
            threads: slice.items,
        }
    }
}

/// Only the list matching the requested type is set.
#[derive(SimpleObject, Default)]
pub struct NotiSlice {
    /// Announcements from the server.
    pub system: Option<Vec<SystemNoti>>,
    /// Threads that were replied to.
    pub replied: Option<Vec<RepliedNoti>>,
    /// Posts that were quoted.
    pub quoted: Option<Vec<Quoted>>,
    pub slice_info: SliceInfo,
}

// -- Forum objects --

pub struct Post(pub models::Post);

#[Object]
impl Post {
    async fn id(&self) -> &str {
        &self.0.id
    }

    async fn anonymous(&self) -> bool {
        self.0.anonymous
    }

    /// The per-thread anonymous id, or the user's name.
    async fn author(&self) -> &str {
        &self.0.author
    }

    async fn content(&self) -> &str {
        &self.0.content
    }

    async fn create_time(&self) -> Time {
        Time(self.0.created_at)
    }

    /// Quoted posts in the order they were quoted; null when there are none.
    async fn quotes(&self, ctx: &Context<'_>) -> Result<Option<Vec<Post>>> {
        let conn = conn(ctx)?;
        let quoted = posts::quotes_of(&conn, &self.0.id).extend()?;
        if quoted.is_empty() {
            return Ok(None);
        }
        Ok(Some(quoted.into_iter().map(Post).collect()))
    }

    /// How many posts quote this one.
    async fn quote_count(&self, ctx: &Context<'_>) -> Result<i32> {
        let conn = conn(ctx)?;
        Ok(to_int(posts::quote_count(&conn, &self.0.id).extend()?))
    }
}

pub struct Thread(pub models::Thread);

#[Object]
impl Thread {
    /// 8 characters, growing to 9 in about 30 years.
    async fn id(&self) -> &str {
        &self.0.id
    }

    async fn anonymous(&self) -> bool {
        self.0.anonymous
    }

    /// Same format as `id` when anonymous, the user's name otherwise.
    async fn author(&self) -> &str {
        &self.0.author
    }

    async fn content(&self) -> &str {
        &self.0.content
    }

    async fn create_time(&self) -> Time {
        Time(self.0.created_at)
    }

    async fn main_tag(&self) -> &str {
        &self.0.main_tag
    }

    async fn sub_tags(&self) -> Option<Vec<String>> {
        Some(self.0.sub_tags.clone())
    }

    async fn title(&self) -> Option<&str> {
        Some(&self.0.title)
    }

    async fn replies(&self, ctx: &Context<'_>, query: SliceQuery) -> Result<PostSlice> {
        let req = query.request(forum(ctx)?).extend()?;
        let conn = conn(ctx)?;
        let slice = posts::replies(&conn, &self.0.id, &req).extend()?;
        Ok(slice.into())
    }

    async fn reply_count(&self, ctx: &Context<'_>) -> Result<i32> {
        let conn = conn(ctx)?;
        Ok(to_int(threads::reply_count(&conn, &self.0.id).extend()?))
    }
}

pub struct User(pub models::User);

#[Object]
impl User {
    async fn email(&self) -> &str {
        &self.0.email
    }

    /// Required before posting non-anonymously.
    async fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// Subscribed tags.
    async fn tags(&self) -> Option<Vec<String>> {
        Some(self.0.tags.clone())
    }
}

// -- Notifications --

#[derive(SimpleObject)]
pub struct UnreadNotiCount {
    /// Announcements from the server.
    pub system: i32,
    /// Threads that were replied to.
    pub replied: i32,
    /// Posts that were quoted.
    pub quoted: i32,
}

#[derive(SimpleObject)]
pub struct SystemNoti {
    pub id: String,
    /// Always "system".
    #[graphql(name = "type")]
    pub kind: String,
    /// When the announcement was published.
    pub event_time: Time,
    pub has_read: bool,
    pub title: String,
    pub content: String,
}

impl From<models::SystemNotification> for SystemNoti {
    fn from(n: models::SystemNotification) -> Self {
        SystemNoti {
            id: n.id,
            kind: models::NotiKind::System.to_string(),
            event_time: Time(n.event_time),
            has_read: n.has_read,
            title: n.title,
            content: n.content,
        }
    }
}

pub struct RepliedNoti(pub models::Notification);

#[Object]
impl RepliedNoti {
    async fn id(&self) -> &str {
        &self.0.id
    }

    /// Always "replied".
    #[graphql(name = "type")]
    async fn kind(&self) -> &str {
        self.0.kind.as_str()
    }

    /// When the latest reply arrived.
    async fn event_time(&self) -> Time {
        Time(self.0.event_time)
    }

    async fn has_read(&self) -> bool {
        self.0.has_read
    }

    /// The thread that was replied to.
    async fn thread(&self, ctx: &Context<'_>) -> Result<Thread> {
        let conn = conn(ctx)?;
        Ok(Thread(threads::get(&conn, &self.0.thread_id).extend()?))
    }

    /// Authors of the replies, as shown on their posts.
    async fn repliers(&self) -> Vec<String> {
        self.0.actors.clone()
    }
}

pub struct Quoted(pub models::Notification);

#[Object]
impl Quoted {
    async fn id(&self) -> &str {
        &self.0.id
    }

    /// Always "quoted".
    #[graphql(name = "type")]
    async fn kind(&self) -> &str {
        self.0.kind.as_str()
    }

    /// When the post was last quoted.
    async fn event_time(&self) -> Time {
        Time(self.0.event_time)
    }

    async fn has_read(&self) -> bool {
        self.0.has_read
    }

    /// The thread the quoted post belongs to.
    async fn thread(&self, ctx: &Context<'_>) -> Result<Thread> {
        let conn = conn(ctx)?;
        Ok(Thread(threads::get(&conn, &self.0.thread_id).extend()?))
    }

    /// The post that was quoted.
    async fn post(&self, ctx: &Context<'_>) -> Result<Post> {
        let conn = conn(ctx)?;
        Ok(Post(posts::get(&conn, &self.0.post_id).extend()?))
    }

    /// Authors of the quoting posts, as shown on those posts.
    async fn quoters(&self) -> Vec<String> {
        self.0.actors.clone()
    }
}

// -- Tags --

pub struct Tags {
    pub main_tags: Vec<String>,
    pub recommended: Vec<String>,
}

#[Object]
impl Tags {
    /// Configured by the operator.
    async fn main_tags(&self) -> Vec<String> {
        self.main_tags.clone()
    }

    /// Picked by the operator.
    async fn recommended(&self) -> Vec<String> {
        self.recommended.clone()
    }

    /// Sub tags grouped under the main tag they were used with, optionally
    /// filtered by a case-insensitive substring.
    async fn tree(
        &self,
        ctx: &Context<'_>,
        query: Option<String>,
    ) -> Result<Option<Vec<TagTreeNode>>> {
        let conn = conn(ctx)?;
        let nodes = tags::tag_tree(&conn, forum(ctx)?, query.as_deref()).extend()?;
        Ok(Some(
            nodes
                .into_iter()
                .map(|n| TagTreeNode {
                    main_tag: n.main_tag,
                    sub_tags: Some(n.sub_tags),
                })
                .collect(),
        ))
    }
}

#[derive(SimpleObject)]
pub struct TagTreeNode {
    pub main_tag: String,
    pub sub_tags: Option<Vec<String>>,
}
