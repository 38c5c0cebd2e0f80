use std::sync::Arc;

use async_graphql::*;

use crate::auth::login::{self, Mailer};
use crate::config::Config;
use crate::forum::ids::IdGenerator;
use crate::forum::{posts, threads, users};
use crate::graphql::types::{Post, PostInput, Thread, ThreadInput, User};
use crate::graphql::{conn, forum, viewer};
use crate::state::DbPool;

/// GraphQL Mutation root
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Publish a reply in a thread.
    async fn pub_post(&self, ctx: &Context<'_>, post: PostInput) -> Result<Post> {
        let viewer = viewer(ctx)?;
        let ids = ctx.data::<Arc<IdGenerator>>()?;
        let conn = conn(ctx)?;
        let user = users::get(&conn, &viewer.id).extend()?;
        let post = posts::create(&conn, ids, &user, post.into(), forum(ctx)?).extend()?;
        Ok(Post(post))
    }

    /// Register or sign in with an email address. A sign-in link is sent to
    /// the address.
    async fn auth(&self, ctx: &Context<'_>, email: String) -> Result<bool> {
        let pool = ctx.data::<DbPool>()?;
        let config = ctx.data::<Config>()?;
        let mailer = ctx.data::<Arc<dyn Mailer>>()?;
        login::start_login(pool, config, mailer.as_ref(), &email)
            .await
            .extend()?;
        Ok(true)
    }

    /// Set the signed-in user's name.
    async fn set_name(&self, ctx: &Context<'_>, name: String) -> Result<User> {
        let viewer = viewer(ctx)?;
        let conn = conn(ctx)?;
        let user = users::set_name(&conn, &viewer.id, &name, forum(ctx)?).extend()?;
        Ok(User(user))
    }

    /// Replace the subscribed tags.
    async fn sync_tags(&self, ctx: &Context<'_>, tags: Vec<Option<String>>) -> Result<User> {
        let viewer = viewer(ctx)?;
        let conn = conn(ctx)?;
        let user = users::sync_tags(&conn, &viewer.id, &tags, forum(ctx)?).extend()?;
        Ok(User(user))
    }

    /// Subscribe to more tags.
    async fn add_subbed_tags(&self, ctx: &Context<'_>, tags: Vec<String>) -> Result<User> {
        let viewer = viewer(ctx)?;
        let conn = conn(ctx)?;
        let user = users::add_tags(&conn, &viewer.id, &tags, forum(ctx)?).extend()?;
        Ok(User(user))
    }

    /// Unsubscribe from tags.
    async fn del_subbed_tags(&self, ctx: &Context<'_>, tags: Vec<String>) -> Result<User> {
        let viewer = viewer(ctx)?;
        let conn = conn(ctx)?;
        let user = users::del_tags(&conn, &viewer.id, &tags, forum(ctx)?).extend()?;
        Ok(User(user))
    }

    /// Start a new thread.
    async fn pub_thread(&self, ctx: &Context<'_>, thread: ThreadInput) -> Result<Thread> {
        let viewer = viewer(ctx)?;
        let ids = ctx.data::<Arc<IdGenerator>>()?;
        let conn = conn(ctx)?;
        let user = users::get(&conn, &viewer.id).extend()?;
        let thread = threads::create(&conn, ids, &user, thread.into(), forum(ctx)?).extend()?;
        Ok(Thread(thread))
    }
}
