use std::sync::Arc;

use async_graphql::{EmptySubscription, Schema};

use super::mutations::MutationRoot;
use super::queries::QueryRoot;
use crate::auth::login::Mailer;
use crate::config::Config;
use crate::forum::ids::IdGenerator;
use crate::state::DbPool;

/// GraphQL Schema type
pub type ForumSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the GraphQL schema. The signed-in user, if any, is attached per
/// request as `CurrentUser` data.
pub fn build_schema(
    db: DbPool,
    config: Config,
    ids: Arc<IdGenerator>,
    mailer: Arc<dyn Mailer>,
) -> ForumSchema {
    let max_depth = config.graphql.max_depth;
    let max_complexity = config.graphql.max_complexity;
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(db)
        .data(config)
        .data(ids)
        .data(mailer)
        .limit_depth(max_depth)
        .limit_complexity(max_complexity)
        .finish()
}
