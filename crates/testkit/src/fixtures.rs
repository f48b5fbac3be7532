//! Ledger fixtures.
//!
//! - `database`: suite-scoped endpoint with migrations applied
//! - `ledger`: test-scoped [`AccountsLedger`] on its own connection pool
//! - `named_account`: a fresh account per name and test, dropped afterwards

use ledger_db::migration::Migrator;
use ledger_db::{AccountsLedger, ExecContext, LedgerError};
use ledger_shared::AccountId;
use sea_orm::DbErr;
use sea_orm_migration::MigratorTrait;
use tracing::{info, warn};

use crate::cache::{Fixture, FixtureError};
use crate::env::{Scope, TestEnv};
use crate::postgres::{PostgresEndpoint, ProvisionError};

/// Errors raised while setting up ledger fixtures.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// No database could be provisioned.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// Connecting or migrating failed.
    #[error("Database setup failed: {0}")]
    Database(#[from] DbErr),

    /// A ledger call made by a fixture failed.
    #[error("Ledger setup failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// URL of a migrated database shared by the suite.
pub async fn database(env: &TestEnv) -> Result<String, FixtureError> {
    env.cache(Scope::Suite, "database", || async {
        let endpoint = PostgresEndpoint::provision().await?;
        let url = endpoint.url().to_owned();

        if let Err(err) = migrate(&url).await {
            endpoint.teardown().await;
            return Err(SetupError::Database(err));
        }

        Ok::<_, SetupError>(Fixture::with_cleanup(url, move || endpoint.teardown()))
    })
    .await
}

async fn migrate(url: &str) -> Result<(), DbErr> {
    let db = ledger_db::connect_url(url).await?;
    Migrator::up(&db, None).await?;
    db.close().await
}

/// A ledger on a connection pool private to the test.
pub async fn ledger(env: &TestEnv) -> Result<AccountsLedger, FixtureError> {
    let url = database(env).await?;

    env.cache(Scope::Test, "ledger", || async move {
        let db = ledger_db::connect_url(&url).await?;
        let ledger = AccountsLedger::new(db.clone());

        Ok::<_, SetupError>(Fixture::with_cleanup(ledger, move || async move {
            if let Err(err) = db.close().await {
                warn!(error = %err, "Failed to close test connection pool");
            }
        }))
    })
    .await
}

/// Like [`ledger`], but reports and returns `None` when no database is reachable.
pub async fn ledger_or_skip(env: &TestEnv) -> Option<AccountsLedger> {
    match ledger(env).await {
        Ok(ledger) => Some(ledger),
        Err(err) => {
            eprintln!("Skipping test {} - database not available: {err}", env.name());
            None
        }
    }
}

/// The test's default account.
pub async fn account(env: &TestEnv) -> Result<AccountId, FixtureError> {
    named_account(env, "default").await
}

/// A fresh zero-balance account, stable for `name` within one test.
///
/// The account is dropped when the test finishes.
pub async fn named_account(env: &TestEnv, name: &str) -> Result<AccountId, FixtureError> {
    let ledger = ledger(env).await?;
    let key = format!("account:{name}");
    let test = env.name().to_owned();

    env.cache(Scope::Test, &key, || async move {
        let id = AccountId::random();
        info!(test = %test, name, account = %id, "Creating account");
        ledger.create_account(&ExecContext::background(), &id).await?;

        let cleanup_id = id.clone();
        let name = name.to_owned();
        Ok::<_, SetupError>(Fixture::with_cleanup(id, move || async move {
            info!(test = %test, name = %name, account = %cleanup_id, "Removing account");
            if let Err(err) = ledger
                .drop_account(&ExecContext::background(), &cleanup_id)
                .await
            {
                warn!(account = %cleanup_id, error = %err, "Failed to remove account");
            }
        }))
    })
    .await
}
