//! GraphQL surface of the forum.
//!
//! Resolvers are thin: they pull the pool, config and viewer out of the
//! context and hand off to `crate::forum`. Domain errors become GraphQL
//! errors with an `extensions.code`.

pub mod mutations;
pub mod queries;
pub mod scalars;
pub mod schema;
pub mod types;

pub use schema::{build_schema, ForumSchema};

use async_graphql::{Context, ErrorExtensions, Result};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::{Config, ForumConfig};
use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::state::DbPool;

pub(crate) fn conn(ctx: &Context<'_>) -> Result<PooledConnection<SqliteConnectionManager>> {
    let pool = ctx.data::<DbPool>()?;
    pool.get().map_err(|e| AppError::from(e).extend())
}

pub(crate) fn forum<'a>(ctx: &Context<'a>) -> Result<&'a ForumConfig> {
    Ok(&ctx.data::<Config>()?.forum)
}

/// The signed-in user, or an `UNAUTHENTICATED` error.
pub(crate) fn viewer<'a>(ctx: &Context<'a>) -> Result<&'a CurrentUser> {
    ctx.data_opt::<CurrentUser>()
        .ok_or_else(|| AppError::Unauthorized.extend())
}

/// GraphQL `Int` is 32 bits; counts beyond that saturate.
pub(crate) fn to_int(n: i64) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
