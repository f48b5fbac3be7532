//! Accounts ledger: balance reads and mutations over the `accounts` table.
//!
//! Single-statement operations (create, drop, credit, balance) run
//! auto-committed; existence checks come from `rows_affected` of the same
//! statement. Debit and transfer read then conditionally write, so they run
//! inside one transaction and lock the rows they read with `FOR UPDATE`.
//! An early return drops the open transaction, which rolls it back.

use ledger_core::posting;
use ledger_shared::AccountId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use tracing::{debug, instrument, warn};

use crate::context::ExecContext;
use crate::entities::accounts;
use crate::error::{AccountSide, LedgerError, storage};

/// Ledger over the `accounts` relation.
///
/// Holds no state besides the connection pool; every read goes to the store.
#[derive(Debug, Clone)]
pub struct AccountsLedger {
    db: DatabaseConnection,
}

impl AccountsLedger {
    /// Creates a new ledger over `db`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Creates an account with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the insert fails, including when `id` already exists.
    #[instrument(level = "debug", skip_all, fields(account = %id))]
    pub async fn create_account(&self, ctx: &ExecContext, id: &AccountId) -> Result<(), LedgerError> {
        const OP: &str = "create account";

        ctx.run(OP, async {
            accounts::ActiveModel {
                id: Set(id.as_str().to_owned()),
                balance: Set(0),
            }
            .insert(&self.db)
            .await
            .map_err(storage(OP, id))?;

            debug!("Account created");
            Ok(())
        })
        .await
    }

    /// Deletes an account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    #[instrument(level = "debug", skip_all, fields(account = %id))]
    pub async fn drop_account(&self, ctx: &ExecContext, id: &AccountId) -> Result<(), LedgerError> {
        const OP: &str = "drop account";

        ctx.run(OP, async {
            let deleted = accounts::Entity::delete_by_id(id.as_str())
                .exec(&self.db)
                .await
                .map_err(storage(OP, id))?
                .rows_affected;

            if deleted == 0 {
                return Err(LedgerError::not_found(id, AccountSide::Account));
            }

            debug!("Account dropped");
            Ok(())
        })
        .await
    }

    /// Adds `amount` to the balance in a single set-based update.
    ///
    /// `amount` may be negative. The ledger does not check the result; the
    /// table constraint rejects a negative balance, surfaced as `Storage`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    #[instrument(level = "debug", skip_all, fields(account = %id, amount = amount))]
    pub async fn add_money(
        &self,
        ctx: &ExecContext,
        id: &AccountId,
        amount: i64,
    ) -> Result<(), LedgerError> {
        const OP: &str = "add money";

        ctx.run(OP, async {
            let updated = accounts::Entity::update_many()
                .col_expr(
                    accounts::Column::Balance,
                    Expr::col(accounts::Column::Balance).add(amount),
                )
                .filter(accounts::Column::Id.eq(id.as_str()))
                .exec(&self.db)
                .await
                .map_err(storage(OP, id))?
                .rows_affected;

            if updated == 0 {
                return Err(LedgerError::not_found(id, AccountSide::Account));
            }

            debug!("Account credited");
            Ok(())
        })
        .await
    }

    /// Debits `amount` from the account, refusing to overdraw it.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount < 0`
    /// - `NotFound` if the account does not exist
    /// - `InsufficientFunds` if the balance is lower than `amount`; nothing is written
    #[instrument(level = "debug", skip_all, fields(account = %id, amount = amount))]
    pub async fn debiting_money(
        &self,
        ctx: &ExecContext,
        id: &AccountId,
        amount: i64,
    ) -> Result<(), LedgerError> {
        const OP: &str = "debit money";

        let result = ctx
            .run(OP, async {
                let txn = self.db.begin().await.map_err(storage(OP, id))?;

                let balance = lock_balance(&txn, id)
                    .await
                    .map_err(storage(OP, id))?
                    .ok_or_else(|| LedgerError::not_found(id, AccountSide::Account))?;

                let remaining = posting::debit(balance, amount)
                    .map_err(|err| LedgerError::from_posting(err, id, id))?;

                upsert_balances(&txn, [(id, remaining)])
                    .await
                    .map_err(storage(OP, id))?;

                txn.commit().await.map_err(storage(OP, id))?;
                Ok(remaining)
            })
            .await;

        match result {
            Ok(balance) => {
                debug!(balance, "Account debited");
                Ok(())
            }
            Err(err) => {
                if err.is_insufficient_funds() {
                    warn!(error = %err, "Debit rejected");
                }
                Err(err)
            }
        }
    }

    /// Moves `amount` from `from` to `to` atomically.
    ///
    /// Both rows are read and locked in one query, in id order, so two
    /// transfers between the same pair in opposite directions cannot
    /// deadlock. Both new balances are written in one batched upsert.
    /// A transfer to the same account checks existence and funds and writes
    /// nothing.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount < 0`
    /// - `NotFound` if either account does not exist (side tells which)
    /// - `InsufficientFunds` if `from` holds less than `amount`; nothing is written
    /// - `Overflow` if the balance of `to` would overflow
    #[instrument(level = "debug", skip_all, fields(from = %from, to = %to, amount = amount))]
    pub async fn transfer_money(
        &self,
        ctx: &ExecContext,
        from: &AccountId,
        to: &AccountId,
        amount: i64,
    ) -> Result<(), LedgerError> {
        const OP: &str = "transfer money";

        let result = ctx
            .run(OP, async {
                let txn = self.db.begin().await.map_err(storage(OP, from))?;

                let rows = accounts::Entity::find()
                    .filter(accounts::Column::Id.is_in([from.as_str(), to.as_str()]))
                    .order_by_asc(accounts::Column::Id)
                    .lock_exclusive()
                    .all(&txn)
                    .await
                    .map_err(storage(OP, from))?;

                let balance_of = |id: &AccountId| {
                    rows.iter()
                        .find(|row| row.id == id.as_str())
                        .map(|row| row.balance)
                };
                let from_balance = balance_of(from)
                    .ok_or_else(|| LedgerError::not_found(from, AccountSide::From))?;
                let to_balance =
                    balance_of(to).ok_or_else(|| LedgerError::not_found(to, AccountSide::To))?;

                let plan = posting::transfer(from_balance, to_balance, amount)
                    .map_err(|err| LedgerError::from_posting(err, from, to))?;

                if from != to {
                    upsert_balances(&txn, [(from, plan.from_balance), (to, plan.to_balance)])
                        .await
                        .map_err(storage(OP, from))?;
                }

                txn.commit().await.map_err(storage(OP, from))?;
                Ok(plan)
            })
            .await;

        match result {
            Ok(plan) => {
                debug!(
                    from_balance = plan.from_balance,
                    to_balance = plan.to_balance,
                    "Transfer committed"
                );
                Ok(())
            }
            Err(err) => {
                if err.is_insufficient_funds() {
                    warn!(error = %err, "Transfer rejected");
                }
                Err(err)
            }
        }
    }

    /// Returns the current balance.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    #[instrument(level = "debug", skip_all, fields(account = %id))]
    pub async fn get_money(&self, ctx: &ExecContext, id: &AccountId) -> Result<i64, LedgerError> {
        const OP: &str = "get balance";

        ctx.run(OP, async {
            accounts::Entity::find_by_id(id.as_str())
                .one(&self.db)
                .await
                .map_err(storage(OP, id))?
                .map(|account| account.balance)
                .ok_or_else(|| LedgerError::not_found(id, AccountSide::Account))
        })
        .await
    }

    /// Returns true if the account exists.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the query fails.
    #[instrument(level = "debug", skip_all, fields(account = %id))]
    pub async fn exists(&self, ctx: &ExecContext, id: &AccountId) -> Result<bool, LedgerError> {
        const OP: &str = "check account";

        ctx.run(OP, async {
            let count = accounts::Entity::find_by_id(id.as_str())
                .count(&self.db)
                .await
                .map_err(storage(OP, id))?;
            Ok(count > 0)
        })
        .await
    }
}

/// Reads a balance and locks the row until the transaction ends.
async fn lock_balance(txn: &DatabaseTransaction, id: &AccountId) -> Result<Option<i64>, DbErr> {
    let account = accounts::Entity::find_by_id(id.as_str())
        .lock_exclusive()
        .one(txn)
        .await?;

    Ok(account.map(|a| a.balance))
}

/// Writes balances with insert-or-replace semantics on `id`.
async fn upsert_balances<const N: usize>(
    txn: &DatabaseTransaction,
    balances: [(&AccountId, i64); N],
) -> Result<(), DbErr> {
    let models = balances.map(|(id, balance)| accounts::ActiveModel {
        id: Set(id.as_str().to_owned()),
        balance: Set(balance),
    });

    accounts::Entity::insert_many(models)
        .on_conflict(
            OnConflict::column(accounts::Column::Id)
                .update_column(accounts::Column::Balance)
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;

    Ok(())
}
