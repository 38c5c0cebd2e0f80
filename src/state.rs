use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::login::Mailer;
use crate::config::Config;
use crate::forum::ids::IdGenerator;
use crate::graphql::ForumSchema;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub ids: Arc<IdGenerator>,
    pub mailer: Arc<dyn Mailer>,
    pub graphql_schema: ForumSchema,
}

impl AppState {
    /// Wire up shared services around an already migrated pool.
    pub fn new(db: DbPool, config: Config, mailer: Arc<dyn Mailer>) -> anyhow::Result<Self> {
        let ids = {
            let conn = db.get()?;
            Arc::new(IdGenerator::seeded(crate::db::max_sequence(&conn)?))
        };
        let graphql_schema =
            crate::graphql::build_schema(db.clone(), config.clone(), ids.clone(), mailer.clone());

        Ok(Self {
            db,
            config,
            ids,
            mailer,
            graphql_schema,
        })
    }
}
