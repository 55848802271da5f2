use std::{sync::Arc, time::Duration};

use migration::{Migrator, MigratorTrait};
use server::{ServerOptions, StaticAuthenticator};
use settings::Database;
use tokio_util::sync::CancellationToken;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledger={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.server.database).await?;
    let engine = engine::Engine::builder()
        .database(db)
        .feed_poll_interval(Duration::from_millis(
            settings.notifications.feed_poll_interval_ms,
        ))
        .token_ttl(chrono::Duration::seconds(
            settings.notifications.token_ttl_secs,
        ))
        .build()
        .await?;
    let changes = engine.change_feed().await?;

    if settings.auth.tokens.is_empty() {
        tracing::warn!("no access tokens configured, every request will be rejected");
    }
    let authenticator = StaticAuthenticator::new(settings.auth.tokens);

    let options = ServerOptions {
        subscriber_capacity: settings.notifications.subscriber_capacity,
        keep_alive: Duration::from_secs(settings.notifications.keep_alive_secs),
    };

    let addr = format!("{}:{}", settings.server.bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {err}");
            return;
        }
        tracing::info!("Shutting down...");
        signal.cancel();
    });

    server::run_with_listener(
        engine,
        changes,
        Arc::new(authenticator),
        options,
        listener,
        shutdown,
    )
    .await?;

    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) if path.starts_with("sqlite:") => path.clone(),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
