use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bbs::auth::LogMailer;
use bbs::config::{Cli, Command, Config};
use bbs::db;
use bbs::forum::notifications;
use bbs::routes;
use bbs::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    if config.public_url_is_wildcard() {
        tracing::warn!(
            "server.public_url is not set; login links will point at {}",
            config.public_url()
        );
    }

    // Initialize database
    let pool = db::create_pool(&config.db_path(), config.database.pool_size)?;
    db::run_migrations(&pool)?;
    let purged = db::purge_expired(&*pool.get()?)?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions and login tokens", purged);
    }

    let state = AppState::new(pool, config.clone(), Arc::new(LogMailer))?;

    match cli.command {
        Some(Command::Announce { title, content }) => {
            let conn = state.db.get()?;
            let noti = notifications::publish_system(&conn, &state.ids, &title, &content)?;
            tracing::info!("Published system notification {}", noti.id);
            Ok(())
        }
        Some(Command::Serve) | None => serve(state, &config).await,
    }
}

async fn serve(state: AppState, config: &Config) -> anyhow::Result<()> {
    let app = routes::app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);
    if config.graphql.playground {
        tracing::info!("GraphQL playground at http://{}/graphql", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
