//! Demo seeder for the accounts ledger.
//!
//! Applies pending migrations, creates two demo accounts, funds the first
//! and transfers part of it to the second.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use ledger_db::migration::Migrator;
use ledger_db::{AccountsLedger, ExecContext, connect};
use ledger_shared::{AccountId, AppConfig};
use sea_orm_migration::MigratorTrait;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Demo source account.
const ALICE: &str = "demo-alice";
/// Demo destination account.
const BOB: &str = "demo-bob";
/// Initial credit of the source account, in minor units.
const OPENING_BALANCE: i64 = 10_000;
/// Amount moved by the demo transfer.
const TRANSFER_AMOUNT: i64 = 2_500;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledger_seeder=info,ledger_db=debug,sea_orm=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect(&config.database).await?;
    info!("Connected to database");

    Migrator::up(&db, None).await?;
    info!("Migrations applied");

    let ledger = AccountsLedger::new(db);
    let alice = AccountId::new(ALICE)?;
    let bob = AccountId::new(BOB)?;

    for id in [&alice, &bob] {
        let ctx = ExecContext::from_config(&config.ledger);
        if ledger.exists(&ctx, id).await? {
            info!(account = %id, "Account already seeded");
        } else {
            ledger.create_account(&ctx, id).await?;
            info!(account = %id, "Account created");
        }
    }

    let ctx = ExecContext::from_config(&config.ledger);
    ledger.add_money(&ctx, &alice, OPENING_BALANCE).await?;

    let ctx = ExecContext::from_config(&config.ledger);
    ledger
        .transfer_money(&ctx, &alice, &bob, TRANSFER_AMOUNT)
        .await?;

    let ctx = ExecContext::from_config(&config.ledger);
    for id in [&alice, &bob] {
        let balance = ledger.get_money(&ctx, id).await?;
        info!(account = %id, balance, "Seeded balance");
    }

    info!("Seeding complete");
    Ok(())
}
