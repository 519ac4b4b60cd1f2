//! Database layer with `SeaORM` entities and the Postgres ledger store.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - [`PgLedgerStore`], the version-checked ledger store
//! - [`PgDirectory`], payer, guardian and organization lookups
//! - Database migrations

pub mod directory;
pub mod entities;
mod mapping;
pub mod migration;
pub mod store;

pub use directory::PgDirectory;
pub use store::PgLedgerStore;

use clubledger_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection sized from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
