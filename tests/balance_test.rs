//! Balance engine integration tests.

mod common;

use common::{date, ledger_with_chart, post_transfer};
use ledger_core::ledger::BalanceQuery;
use ledger_core::models::EntrySource;
use ledger_core::LedgerError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn rent_accrual_raises_receivable_and_income() {
    let ledger = ledger_with_chart().await;
    ledger
        .registry()
        .get_or_create_scoped_account("1100", "S1", "Receivable - S1")
        .await
        .expect("Failed to create sub-account");

    post_transfer(
        &ledger,
        date(2026, 1, 1),
        "1100-S1",
        "4001",
        dec!(180),
        EntrySource::RentalAccrual,
    )
    .await;

    let receivable = ledger
        .balance("1100-S1", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    assert_eq!(receivable, dec!(180));

    let income = ledger
        .balance("4001", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    assert_eq!(income, dec!(180));
}

#[tokio::test]
async fn payment_clears_receivable() {
    let ledger = ledger_with_chart().await;
    ledger
        .registry()
        .get_or_create_scoped_account("1100", "S1", "Receivable - S1")
        .await
        .expect("Failed to create sub-account");

    post_transfer(
        &ledger,
        date(2026, 1, 1),
        "1100-S1",
        "4001",
        dec!(180),
        EntrySource::RentalAccrual,
    )
    .await;
    post_transfer(
        &ledger,
        date(2026, 1, 5),
        "1000",
        "1100-S1",
        dec!(180),
        EntrySource::Payment,
    )
    .await;

    let receivable = ledger
        .balance("1100-S1", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    assert_eq!(receivable, dec!(0));

    let bank = ledger
        .balance("1000", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    assert_eq!(bank, dec!(180));

    let income = ledger
        .balance("4001", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    assert_eq!(income, dec!(180));
}

#[tokio::test]
async fn credit_normal_accounts_report_positive_balances() {
    let ledger = ledger_with_chart().await;

    // Liability increases with a credit.
    post_transfer(
        &ledger,
        date(2026, 1, 10),
        "5000",
        "2000",
        dec!(1000),
        EntrySource::ExpensePayment,
    )
    .await;

    let payable = ledger
        .balance("2000", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    assert_eq!(payable, dec!(1000));

    let expense = ledger
        .balance("5000", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    assert_eq!(expense, dec!(1000));
}

#[tokio::test]
async fn as_of_date_excludes_later_entries() {
    let ledger = ledger_with_chart().await;

    post_transfer(
        &ledger,
        date(2026, 1, 15),
        "1000",
        "4001",
        dec!(100),
        EntrySource::Payment,
    )
    .await;
    post_transfer(
        &ledger,
        date(2026, 2, 15),
        "1000",
        "4001",
        dec!(250),
        EntrySource::Payment,
    )
    .await;

    let january = ledger
        .balance("1000", BalanceQuery::as_of(date(2026, 1, 31)))
        .await
        .expect("Failed to compute balance");
    assert_eq!(january, dec!(100));

    let all_time = ledger
        .balance("1000", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    assert_eq!(all_time, dec!(350));
}

#[tokio::test]
async fn parent_balance_aggregates_children() {
    let ledger = ledger_with_chart().await;
    ledger
        .registry()
        .get_or_create_scoped_account("1100", "S1", "Receivable - S1")
        .await
        .expect("Failed to create sub-account");
    ledger
        .registry()
        .get_or_create_scoped_account("1100", "S2", "Receivable - S2")
        .await
        .expect("Failed to create sub-account");

    post_transfer(
        &ledger,
        date(2026, 1, 1),
        "1100-S1",
        "4001",
        dec!(180),
        EntrySource::RentalAccrual,
    )
    .await;
    post_transfer(
        &ledger,
        date(2026, 1, 1),
        "1100-S2",
        "4001",
        dec!(220),
        EntrySource::RentalAccrual,
    )
    .await;
    // Direct entry on the control account itself.
    post_transfer(
        &ledger,
        date(2026, 1, 2),
        "1100",
        "4001",
        dec!(50),
        EntrySource::Manual,
    )
    .await;

    let rolled_up = ledger
        .balance("1100", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    let direct_only = ledger
        .balance("1100", BalanceQuery::direct_only())
        .await
        .expect("Failed to compute balance");
    let s1 = ledger
        .balance("1100-S1", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    let s2 = ledger
        .balance("1100-S2", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");

    assert_eq!(rolled_up, dec!(450));
    assert_eq!(direct_only, dec!(50));
    assert_eq!(rolled_up, direct_only + s1 + s2);
}

#[tokio::test]
async fn trial_balance_sums_to_zero() {
    let ledger = ledger_with_chart().await;
    ledger
        .registry()
        .get_or_create_scoped_account("1100", "S1", "Receivable - S1")
        .await
        .expect("Failed to create sub-account");

    post_transfer(
        &ledger,
        date(2026, 1, 1),
        "1100-S1",
        "4001",
        dec!(180),
        EntrySource::RentalAccrual,
    )
    .await;
    post_transfer(
        &ledger,
        date(2026, 1, 5),
        "1000",
        "1100-S1",
        dec!(100),
        EntrySource::Payment,
    )
    .await;
    post_transfer(
        &ledger,
        date(2026, 1, 10),
        "5000",
        "2000",
        dec!(75),
        EntrySource::ExpensePayment,
    )
    .await;

    let trial = ledger
        .trial_balance(None)
        .await
        .expect("Failed to compute trial balance");

    assert!(trial.is_balanced());
    assert_eq!(trial.total(), dec!(0));

    // Raw debit-minus-credit balances, no normal-side orientation.
    assert_eq!(trial.balances["1000"], dec!(100));
    assert_eq!(trial.balances["1100-S1"], dec!(80));
    assert_eq!(trial.balances["4001"], dec!(-180));
    assert_eq!(trial.balances["2000"], dec!(-75));
    assert_eq!(trial.balances["5000"], dec!(75));

    // Only accounts with posted entries appear.
    assert!(!trial.balances.contains_key("3000"));

    ledger
        .verify_integrity(None)
        .await
        .expect("Integrity check should pass");
}

#[tokio::test]
async fn balance_of_unknown_account_errors() {
    let ledger = ledger_with_chart().await;

    let result = ledger.balance("9998", BalanceQuery::default()).await;
    assert!(matches!(result, Err(LedgerError::UnknownAccount(code)) if code == "9998"));
}
