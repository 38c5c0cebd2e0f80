use async_graphql::*;

use crate::db::models::NotiKind;
use crate::error::AppError;
use crate::forum::{notifications, posts, threads, users};
use crate::graphql::types::{
    NotiSlice, Post, Quoted, RepliedNoti, SliceInfo, SliceQuery, SystemNoti, Tags, Thread,
    ThreadSlice, UnreadNotiCount, User,
};
use crate::graphql::{conn, forum, to_int, viewer};

/// GraphQL Query root
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// A single post.
    async fn post(&self, ctx: &Context<'_>, id: String) -> Result<Post> {
        let conn = conn(ctx)?;
        Ok(Post(posts::get(&conn, id.trim()).extend()?))
    }

    /// The signed-in user's profile.
    async fn profile(&self, ctx: &Context<'_>) -> Result<User> {
        let viewer = viewer(ctx)?;
        let conn = conn(ctx)?;
        Ok(User(users::get(&conn, &viewer.id).extend()?))
    }

    /// Threads newest first, optionally only those carrying one of `tags`.
    async fn thread_slice(
        &self,
        ctx: &Context<'_>,
        tags: Option<Vec<String>>,
        query: SliceQuery,
    ) -> Result<ThreadSlice> {
        let req = query.request(forum(ctx)?).extend()?;
        let conn = conn(ctx)?;
        let slice = threads::slice(&conn, tags.as_deref(), &req).extend()?;
        Ok(slice.into())
    }

    /// A single thread.
    async fn thread(&self, ctx: &Context<'_>, id: String) -> Result<Thread> {
        let conn = conn(ctx)?;
        Ok(Thread(threads::get(&conn, id.trim()).extend()?))
    }

    /// Unread notifications of each type for the signed-in user.
    async fn unread_noti_count(&self, ctx: &Context<'_>) -> Result<UnreadNotiCount> {
        let viewer = viewer(ctx)?;
        let conn = conn(ctx)?;
        let counts = notifications::unread_counts(&conn, &viewer.id).extend()?;
        Ok(UnreadNotiCount {
            system: to_int(counts.system),
            replied: to_int(counts.replied),
            quoted: to_int(counts.quoted),
        })
    }

    /// Notifications of one type ("system", "replied" or "quoted") for the
    /// signed-in user, newest first. Returned notifications are marked read.
    async fn notification(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "type")] kind: String,
        query: SliceQuery,
    ) -> Result<NotiSlice> {
        let kind: NotiKind = kind
            .trim()
            .parse()
            .map_err(|e: String| AppError::BadRequest(e).extend())?;
        let req = query.request(forum(ctx)?).extend()?;
        let viewer = viewer(ctx)?;
        let conn = conn(ctx)?;

        let noti = match kind {
            NotiKind::System => {
                let slice = notifications::system_slice(&conn, &viewer.id, &req).extend()?;
                let slice = slice.map(SystemNoti::from);
                NotiSlice {
                    slice_info: SliceInfo::from(&slice),
                    system: Some(slice.items),
                    ..NotiSlice::default()
                }
            }
            NotiKind::Replied => {
                let slice = notifications::event_slice(&conn, &viewer.id, kind, &req).extend()?;
                let slice = slice.map(RepliedNoti);
                NotiSlice {
                    slice_info: SliceInfo::from(&slice),
                    replied: Some(slice.items),
                    ..NotiSlice::default()
                }
            }
            NotiKind::Quoted => {
                let slice = notifications::event_slice(&conn, &viewer.id, kind, &req).extend()?;
                let slice = slice.map(Quoted);
                NotiSlice {
                    slice_info: SliceInfo::from(&slice),
                    quoted: Some(slice.items),
                    ..NotiSlice::default()
                }
            }
        };
        Ok(noti)
    }

    /// Main tags, recommended tags and the tag tree.
    async fn tags(&self, ctx: &Context<'_>) -> Result<Tags> {
        let forum = forum(ctx)?;
        Ok(Tags {
            main_tags: forum.main_tags.clone(),
            recommended: forum.recommended_tags.clone(),
        })
    }
}
