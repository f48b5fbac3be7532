//! Core posting rules for the accounts ledger.
//!
//! This crate contains pure balance arithmetic with ZERO database dependencies.
//! The database layer reads balances inside a transaction, asks these rules
//! for the new balances and writes them back.
//!
//! # Modules
//!
//! - `posting` - Debit and transfer rules

pub mod posting;
