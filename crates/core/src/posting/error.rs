//! Posting error types.

use thiserror::Error;

/// Errors that can occur while applying a posting rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PostingError {
    /// Amount to move cannot be negative.
    #[error("Amount cannot be negative: {0}")]
    NegativeAmount(i64),

    /// The debited balance would drop below zero.
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Balance before the debit.
        balance: i64,
        /// Amount requested.
        requested: i64,
    },

    /// The credited balance would exceed `i64::MAX`.
    #[error("Balance overflow")]
    Overflow,
}
