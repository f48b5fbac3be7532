//! Common types used across the ledger.

pub mod account_id;

pub use account_id::{AccountId, AccountIdError, MAX_ACCOUNT_ID_LEN};
