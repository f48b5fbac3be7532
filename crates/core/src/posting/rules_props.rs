//! Property-based tests for posting rules.
//!
//! - Conservation: a transfer never creates or destroys money
//! - Non-negativity: no rule produces a negative balance
//! - Rejection is total: an insufficient debit reports the untouched balance

use proptest::prelude::*;

use super::error::PostingError;
use super::rules::{debit, transfer};

/// Strategy for realistic non-negative balances.
fn balance() -> impl Strategy<Value = i64> {
    0i64..1_000_000_000_000i64
}

/// Strategy for non-negative amounts.
fn amount() -> impl Strategy<Value = i64> {
    0i64..1_000_000_000_000i64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_transfer_conserves_total(from in balance(), to in balance(), m in amount()) {
        match transfer(from, to, m) {
            Ok(plan) => {
                prop_assert_eq!(plan.from_balance + plan.to_balance, from + to);
                prop_assert_eq!(plan.from_balance, from - m);
                prop_assert_eq!(plan.to_balance, to + m);
            }
            Err(err) => {
                prop_assert!(m > from);
                prop_assert_eq!(err, PostingError::InsufficientFunds { balance: from, requested: m });
            }
        }
    }

    #[test]
    fn prop_debit_never_negative(b in balance(), m in amount()) {
        if let Ok(remaining) = debit(b, m) {
            prop_assert!(remaining >= 0);
            prop_assert!(m <= b);
        } else {
            prop_assert!(m > b);
        }
    }

    #[test]
    fn prop_transfer_never_negative(from in balance(), to in balance(), m in amount()) {
        if let Ok(plan) = transfer(from, to, m) {
            prop_assert!(plan.from_balance >= 0);
            prop_assert!(plan.to_balance >= to);
        }
    }

    #[test]
    fn prop_negative_amount_always_rejected(b in balance(), m in i64::MIN..0i64) {
        prop_assert_eq!(debit(b, m), Err(PostingError::NegativeAmount(m)));
        prop_assert_eq!(transfer(b, b, m), Err(PostingError::NegativeAmount(m)));
    }
}
