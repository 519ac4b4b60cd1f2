//! Club Ledger API Server
//!
//! Main entry point for the ledger reconciliation service.

use std::sync::Arc;

use anyhow::Context;
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clubledger_api::{AppState, create_router};
use clubledger_core::service::LedgerService;
use clubledger_db::migration::Migrator;
use clubledger_db::{PgDirectory, PgLedgerStore, connect_with};
use clubledger_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clubledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect_with(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    if config.database.run_migrations {
        Migrator::up(&db, None).await?;
        info!("Migrations applied");
    }

    let directory = Arc::new(PgDirectory::new(db.clone()));
    let ledger = LedgerService::new(
        Arc::new(PgLedgerStore::new(db)),
        directory.clone(),
        directory.clone(),
        directory,
        config.ledger,
    );
    info!(
        max_conflict_retries = config.ledger.max_conflict_retries,
        auto_apply_credit = config.ledger.auto_apply_credit,
        "Ledger service configured"
    );

    let app = create_router(AppState::new(ledger));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
