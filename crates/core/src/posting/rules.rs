//! Balance arithmetic for debits and transfers.

use super::error::PostingError;

/// New balances for both sides of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    /// Balance of the source account after the transfer.
    pub from_balance: i64,
    /// Balance of the destination account after the transfer.
    pub to_balance: i64,
}

/// Computes the balance left after debiting `amount` from `balance`.
///
/// # Errors
///
/// - [`PostingError::NegativeAmount`] if `amount < 0`
/// - [`PostingError::InsufficientFunds`] if the result would be negative
pub fn debit(balance: i64, amount: i64) -> Result<i64, PostingError> {
    if amount < 0 {
        return Err(PostingError::NegativeAmount(amount));
    }

    match balance.checked_sub(amount) {
        Some(remaining) if remaining >= 0 => Ok(remaining),
        _ => Err(PostingError::InsufficientFunds {
            balance,
            requested: amount,
        }),
    }
}

/// Computes the balances after moving `amount` from one account to another.
///
/// The sum of both balances is preserved.
///
/// # Errors
///
/// - [`PostingError::NegativeAmount`] if `amount < 0`
/// - [`PostingError::InsufficientFunds`] if `from_balance < amount`
/// - [`PostingError::Overflow`] if the destination balance would overflow
pub fn transfer(from_balance: i64, to_balance: i64, amount: i64) -> Result<TransferPlan, PostingError> {
    let from_balance = debit(from_balance, amount)?;
    let to_balance = to_balance
        .checked_add(amount)
        .ok_or(PostingError::Overflow)?;

    Ok(TransferPlan {
        from_balance,
        to_balance,
    })
}
