//! Database layer for the accounts ledger.
//!
//! This crate provides:
//! - The `SeaORM` entity for the `accounts` table
//! - Database migrations
//! - [`AccountsLedger`], the transactional ledger over `accounts`
//! - [`ExecContext`], the cancellation and deadline carrier for operations

pub mod context;
pub mod entities;
pub mod error;
pub mod migration;
pub mod repositories;

pub use context::ExecContext;
pub use error::{AccountSide, ErrorKind, LedgerError};
pub use repositories::AccountsLedger;

use std::time::Duration;

use ledger_shared::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection pool using `config`.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    Database::connect(connect_options(config)).await
}

/// Establishes a connection pool to `database_url` with default settings.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_url(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    connect(&DatabaseConfig::with_url(database_url)).await
}

fn connect_options(config: &DatabaseConfig) -> ConnectOptions {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(config.sqlx_logging);
    options
}
