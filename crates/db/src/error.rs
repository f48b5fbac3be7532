//! Ledger error types.
//!
//! Callers branch on [`LedgerError::kind`] or the `is_*` helpers, never on
//! message text.

use ledger_core::posting::PostingError;
use ledger_shared::AccountId;
use sea_orm::DbErr;

/// Which account of an operation a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSide {
    /// The single account of a non-transfer operation.
    Account,
    /// Source account of a transfer.
    From,
    /// Destination account of a transfer.
    To,
}

impl std::fmt::Display for AccountSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Account => f.write_str("Account"),
            Self::From => f.write_str("Source account"),
            Self::To => f.write_str("Destination account"),
        }
    }
}

/// Broad classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced account has no row.
    NotFound,
    /// A debit or transfer would drive a balance negative.
    InsufficientFunds,
    /// Arguments rejected before any write.
    Validation,
    /// Failure reported by the store.
    Storage,
    /// Caller cancelled the operation or its deadline passed.
    Context,
}

/// Errors returned by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Account does not exist.
    #[error("{side} {account} does not exist")]
    NotFound {
        /// Missing account.
        account: AccountId,
        /// Role of the account in the operation.
        side: AccountSide,
    },

    /// Balance is too low for the requested debit.
    #[error("Insufficient funds on account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Account that would be overdrawn.
        account: AccountId,
        /// Balance observed inside the transaction.
        balance: i64,
        /// Amount requested.
        requested: i64,
    },

    /// Amount cannot be negative.
    #[error("Invalid amount {amount}: must not be negative")]
    InvalidAmount {
        /// Rejected amount.
        amount: i64,
    },

    /// Crediting would overflow the balance.
    #[error("Balance of account {account} would overflow")]
    Overflow {
        /// Account that would overflow.
        account: AccountId,
    },

    /// Store failure, wrapped with the operation and account.
    #[error("Failed to {operation} for account {account}: {source}")]
    Storage {
        /// Ledger operation that failed.
        operation: &'static str,
        /// Account the operation was issued for.
        account: AccountId,
        /// Underlying database error.
        #[source]
        source: DbErr,
    },

    /// Operation cancelled by the caller.
    #[error("Operation {operation} was cancelled")]
    Cancelled {
        /// Ledger operation that was cancelled.
        operation: &'static str,
    },

    /// Operation did not finish before its deadline.
    #[error("Operation {operation} exceeded its deadline")]
    DeadlineExceeded {
        /// Ledger operation that timed out.
        operation: &'static str,
    },
}

impl LedgerError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidAmount { .. } | Self::Overflow { .. } => ErrorKind::Validation,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => ErrorKind::Context,
        }
    }

    /// Returns true if the error is an insufficient funds rejection.
    #[must_use]
    pub const fn is_insufficient_funds(&self) -> bool {
        matches!(self, Self::InsufficientFunds { .. })
    }

    /// Returns true if a referenced account does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for caller-driven cancellation or timeout.
    #[must_use]
    pub const fn is_context(&self) -> bool {
        matches!(self.kind(), ErrorKind::Context)
    }

    pub(crate) fn not_found(account: &AccountId, side: AccountSide) -> Self {
        Self::NotFound {
            account: account.clone(),
            side,
        }
    }

    /// Attributes a posting rule failure to the account it concerns.
    ///
    /// Insufficient funds always concern `debited`; overflow concerns `credited`.
    pub(crate) fn from_posting(err: PostingError, debited: &AccountId, credited: &AccountId) -> Self {
        match err {
            PostingError::NegativeAmount(amount) => Self::InvalidAmount { amount },
            PostingError::InsufficientFunds { balance, requested } => Self::InsufficientFunds {
                account: debited.clone(),
                balance,
                requested,
            },
            PostingError::Overflow => Self::Overflow {
                account: credited.clone(),
            },
        }
    }
}

/// Builds a closure wrapping a [`DbErr`] with operation context.
pub(crate) fn storage<'a>(
    operation: &'static str,
    account: &'a AccountId,
) -> impl FnOnce(DbErr) -> LedgerError + 'a {
    move |source| LedgerError::Storage {
        operation,
        account: account.clone(),
        source,
    }
}
