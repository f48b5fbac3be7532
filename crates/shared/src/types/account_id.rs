//! Account identifiers.
//!
//! Accounts are keyed by opaque text. The only rules are that the id is not
//! blank and fits the `accounts.id` column.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum identifier length, matching `VARCHAR(255)` on `accounts.id`.
pub const MAX_ACCOUNT_ID_LEN: usize = 255;

/// Errors raised when building an [`AccountId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountIdError {
    /// The identifier is empty or whitespace only.
    #[error("Account id must not be empty")]
    Empty,

    /// The identifier does not fit the storage column.
    #[error("Account id is {0} characters long, maximum is {MAX_ACCOUNT_ID_LEN}")]
    TooLong(usize),
}

/// Unique identifier of a ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Creates an account id, rejecting blank or oversized values.
    pub fn new(id: impl Into<String>) -> Result<Self, AccountIdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(AccountIdError::Empty);
        }
        let len = id.chars().count();
        if len > MAX_ACCOUNT_ID_LEN {
            return Err(AccountIdError::TooLong(len));
        }
        Ok(Self(id))
    }

    /// Creates a fresh, unique account id (UUID v7 text).
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}
