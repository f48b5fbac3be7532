//! Debit and transfer rules.
//!
//! Balances are signed 64-bit integers in minor units and never go below
//! zero. Every rule either returns the complete set of new balances or an
//! error, never a partial result.

pub mod error;
pub mod rules;

#[cfg(test)]
mod rules_props;

pub use error::PostingError;
pub use rules::{TransferPlan, debit, transfer};
