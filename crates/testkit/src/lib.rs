//! Test fixtures for the accounts ledger.
//!
//! This crate provides:
//! - [`FixtureCache`], compute-once-per-key values with guaranteed cleanup
//! - [`TestEnv`] and [`Suite`], the test and suite scopes built on it
//! - [`PostgresEndpoint`], a disposable PostgreSQL instance
//! - Ledger fixtures (`database`, `ledger`, `account`, `named_account`)
//!
//! Integration tests drive everything through [`run_test`], which executes on
//! one shared runtime so pooled connections outlive individual tests.

pub mod cache;
pub mod env;
pub mod fixtures;
pub mod postgres;

pub use cache::{Fixture, FixtureCache, FixtureError};
pub use env::{Scope, Suite, TestEnv, block_on, run_test};
pub use fixtures::{SetupError, account, database, ledger, ledger_or_skip, named_account};
pub use postgres::{PostgresEndpoint, ProvisionError};
