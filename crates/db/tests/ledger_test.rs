//! Integration tests for the accounts ledger.
//!
//! Each test runs against a migrated PostgreSQL provided by the testkit
//! fixtures. Tests are skipped when no database can be reached.

use std::time::Duration;

use ledger_db::entities::accounts;
use ledger_db::{AccountSide, AccountsLedger, ErrorKind, ExecContext, LedgerError};
use ledger_shared::AccountId;
use ledger_testkit::{account, ledger_or_skip, named_account, run_test};
use sea_orm::{DatabaseTransaction, EntityTrait, QuerySelect, TransactionTrait};

async fn balance(ledger: &AccountsLedger, id: &AccountId) -> i64 {
    ledger
        .get_money(&ExecContext::background(), id)
        .await
        .expect("Failed to read balance")
}

/// Opens a transaction on another connection holding the row lock on `id`.
async fn hold_row_lock(ledger: &AccountsLedger, id: &AccountId) -> DatabaseTransaction {
    let txn = ledger
        .connection()
        .begin()
        .await
        .expect("Failed to begin locking transaction");
    accounts::Entity::find_by_id(id.as_str())
        .lock_exclusive()
        .one(&txn)
        .await
        .expect("Failed to lock account row");
    txn
}

#[test]
fn test_create_then_balance_is_zero() {
    run_test("create_then_balance_is_zero", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let id = account(env).await.expect("Failed to create account");

        assert_eq!(balance(&ledger, &id).await, 0);
        assert!(
            ledger
                .exists(&ExecContext::background(), &id)
                .await
                .unwrap()
        );
    });
}

#[test]
fn test_same_name_is_same_account_within_test() {
    run_test("same_name_is_same_account", async |env| {
        if ledger_or_skip(env).await.is_none() {
            return;
        }

        let first = named_account(env, "alice").await.unwrap();
        let again = named_account(env, "alice").await.unwrap();
        let bob = named_account(env, "bob").await.unwrap();

        assert_eq!(first, again);
        assert_ne!(first, bob);
    });
}

#[test]
fn test_credit_accumulates() {
    run_test("credit_accumulates", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let id = account(env).await.unwrap();

        ledger.add_money(&ctx, &id, 100).await.unwrap();
        ledger.add_money(&ctx, &id, 25).await.unwrap();

        assert_eq!(balance(&ledger, &id).await, 125);
    });
}

#[test]
fn test_credit_missing_account_is_not_found() {
    run_test("credit_missing_account", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let missing = AccountId::random();

        let err = ledger
            .add_money(&ExecContext::background(), &missing, 10)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        // No implicit creation.
        assert!(
            !ledger
                .exists(&ExecContext::background(), &missing)
                .await
                .unwrap()
        );
    });
}

#[test]
fn test_negative_credit_cannot_overdraw() {
    run_test("negative_credit_cannot_overdraw", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let id = account(env).await.unwrap();
        ledger.add_money(&ctx, &id, 10).await.unwrap();

        ledger.add_money(&ctx, &id, -4).await.unwrap();
        assert_eq!(balance(&ledger, &id).await, 6);

        let err = ledger.add_money(&ctx, &id, -7).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(balance(&ledger, &id).await, 6);
    });
}

#[test]
fn test_debit_below_zero_rejected_and_balance_unchanged() {
    run_test("debit_below_zero_rejected", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let id = account(env).await.unwrap();

        let err = ledger
            .debiting_money(&ExecContext::background(), &id, 10)
            .await
            .unwrap_err();

        assert!(err.is_insufficient_funds());
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                balance: 0,
                requested: 10,
                ..
            }
        ));
        assert_eq!(balance(&ledger, &id).await, 0);
    });
}

#[test]
fn test_debit_after_credit_succeeds() {
    run_test("debit_after_credit", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let id = account(env).await.unwrap();

        let err = ledger.debiting_money(&ctx, &id, 10).await.unwrap_err();
        assert!(err.is_insufficient_funds());

        ledger.add_money(&ctx, &id, 100).await.unwrap();
        ledger.debiting_money(&ctx, &id, 10).await.unwrap();

        assert_eq!(balance(&ledger, &id).await, 90);
    });
}

#[test]
fn test_debit_entire_balance() {
    run_test("debit_entire_balance", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let id = account(env).await.unwrap();
        ledger.add_money(&ctx, &id, 40).await.unwrap();

        ledger.debiting_money(&ctx, &id, 40).await.unwrap();

        assert_eq!(balance(&ledger, &id).await, 0);
    });
}

#[test]
fn test_debit_missing_account_is_not_found() {
    run_test("debit_missing_account", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };

        let err = ledger
            .debiting_money(&ExecContext::background(), &AccountId::random(), 1)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::NotFound {
                side: AccountSide::Account,
                ..
            }
        ));
    });
}

#[test]
fn test_debit_negative_amount_rejected() {
    run_test("debit_negative_amount", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let id = account(env).await.unwrap();
        ledger.add_money(&ctx, &id, 10).await.unwrap();

        let err = ledger.debiting_money(&ctx, &id, -5).await.unwrap_err();

        assert!(matches!(err, LedgerError::InvalidAmount { amount: -5 }));
        assert_eq!(balance(&ledger, &id).await, 10);
    });
}

#[test]
fn test_transfer_moves_money_and_conserves_total() {
    run_test("transfer_ok", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let alice = named_account(env, "alice").await.unwrap();
        let bob = named_account(env, "bob").await.unwrap();
        ledger.add_money(&ctx, &alice, 100).await.unwrap();
        ledger.add_money(&ctx, &bob, 5).await.unwrap();

        ledger.transfer_money(&ctx, &alice, &bob, 10).await.unwrap();

        let a = balance(&ledger, &alice).await;
        let b = balance(&ledger, &bob).await;
        assert_eq!(a, 90);
        assert_eq!(b, 15);
        assert_eq!(a + b, 105);
    });
}

#[test]
fn test_transfer_insufficient_is_all_or_nothing() {
    run_test("transfer_no_money", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let alice = named_account(env, "alice").await.unwrap();
        let bob = named_account(env, "bob").await.unwrap();
        ledger.add_money(&ctx, &bob, 30).await.unwrap();

        let err = ledger
            .transfer_money(&ctx, &alice, &bob, 100)
            .await
            .unwrap_err();

        assert!(err.is_insufficient_funds());
        assert!(matches!(err, LedgerError::InsufficientFunds { ref account, .. } if *account == alice));
        assert_eq!(balance(&ledger, &alice).await, 0);
        assert_eq!(balance(&ledger, &bob).await, 30);
    });
}

#[test]
fn test_transfer_missing_accounts_name_the_side() {
    run_test("transfer_missing_accounts", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let alice = named_account(env, "alice").await.unwrap();
        let ghost = AccountId::random();
        ledger.add_money(&ctx, &alice, 50).await.unwrap();

        let err = ledger
            .transfer_money(&ctx, &alice, &ghost, 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound { side: AccountSide::To, ref account } if *account == ghost
        ));

        let err = ledger
            .transfer_money(&ctx, &ghost, &alice, 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound { side: AccountSide::From, ref account } if *account == ghost
        ));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert_eq!(balance(&ledger, &alice).await, 50);
    });
}

#[test]
fn test_transfer_to_same_account_changes_nothing() {
    run_test("transfer_to_self", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let id = account(env).await.unwrap();
        ledger.add_money(&ctx, &id, 20).await.unwrap();

        ledger.transfer_money(&ctx, &id, &id, 15).await.unwrap();
        assert_eq!(balance(&ledger, &id).await, 20);

        let err = ledger.transfer_money(&ctx, &id, &id, 21).await.unwrap_err();
        assert!(err.is_insufficient_funds());
    });
}

#[test]
fn test_drop_requires_existence() {
    run_test("drop_requires_existence", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();

        let err = ledger
            .drop_account(&ctx, &AccountId::random())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        // Not a fixture: the test removes it itself.
        let id = AccountId::random();
        ledger.create_account(&ctx, &id).await.unwrap();
        ledger.drop_account(&ctx, &id).await.unwrap();

        let err = ledger.get_money(&ctx, &id).await.unwrap_err();
        assert!(err.is_not_found());
        let err = ledger.drop_account(&ctx, &id).await.unwrap_err();
        assert!(err.is_not_found());
    });
}

#[test]
fn test_duplicate_create_fails_with_storage_error() {
    run_test("duplicate_create", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let id = account(env).await.unwrap();
        ledger.add_money(&ctx, &id, 7).await.unwrap();

        let err = ledger.create_account(&ctx, &id).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(balance(&ledger, &id).await, 7);
    });
}

#[test]
fn test_cancelled_context_writes_nothing() {
    run_test("cancelled_context", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let id = account(env).await.unwrap();
        ledger
            .add_money(&ExecContext::background(), &id, 50)
            .await
            .unwrap();

        let ctx = ExecContext::background();
        ctx.cancel();
        let err = ledger.debiting_money(&ctx, &id, 10).await.unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled { .. }));

        let expired = ExecContext::with_timeout(Duration::ZERO);
        let err = ledger.add_money(&expired, &id, 10).await.unwrap_err();
        assert!(matches!(err, LedgerError::DeadlineExceeded { .. }));
        assert_eq!(err.kind(), ErrorKind::Context);

        assert_eq!(balance(&ledger, &id).await, 50);
    });
}

#[test]
fn test_deadline_during_debit_rolls_back() {
    run_test("deadline_during_debit", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let id = account(env).await.unwrap();
        ledger.add_money(&ctx, &id, 50).await.unwrap();

        // The debit blocks on the row lock until its deadline fires.
        let holder = hold_row_lock(&ledger, &id).await;
        let err = ledger
            .debiting_money(&ExecContext::with_timeout(Duration::from_millis(300)), &id, 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::DeadlineExceeded {
                operation: "debit money"
            }
        ));

        holder.rollback().await.unwrap();
        assert_eq!(balance(&ledger, &id).await, 50);

        ledger.debiting_money(&ctx, &id, 10).await.unwrap();
        assert_eq!(balance(&ledger, &id).await, 40);
    });
}

#[test]
fn test_cancel_during_transfer_rolls_back() {
    run_test("cancel_during_transfer", async |env| {
        let Some(ledger) = ledger_or_skip(env).await else {
            return;
        };
        let ctx = ExecContext::background();
        let alice = named_account(env, "alice").await.unwrap();
        let bob = named_account(env, "bob").await.unwrap();
        ledger.add_money(&ctx, &alice, 100).await.unwrap();

        let holder = hold_row_lock(&ledger, &bob).await;
        let cancelled = ExecContext::background();
        let canceller = cancelled.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let err = ledger
            .transfer_money(&cancelled, &alice, &bob, 30)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled { .. }));

        holder.rollback().await.unwrap();
        assert_eq!(balance(&ledger, &alice).await, 100);
        assert_eq!(balance(&ledger, &bob).await, 0);

        ledger.transfer_money(&ctx, &alice, &bob, 30).await.unwrap();
        assert_eq!(balance(&ledger, &alice).await, 70);
        assert_eq!(balance(&ledger, &bob).await, 30);
    });
}
