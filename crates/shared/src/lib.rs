//! Shared types and configuration for the accounts ledger.
//!
//! This crate provides common types used across all other crates:
//! - `AccountId`, the validated account identifier
//! - Configuration management

pub mod config;
pub mod types;

pub use config::{AppConfig, DatabaseConfig, LedgerConfig};
pub use types::{AccountId, AccountIdError};
