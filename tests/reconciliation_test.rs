//! Reconciliation protocol integration tests.

mod common;

use async_trait::async_trait;
use common::{date, ledger_with_chart, post_transfer};
use ledger_core::ledger::{BalanceQuery, ExpectedBalanceSource, ReconciliationOutcome};
use ledger_core::models::{EntryFilter, EntrySource};
use ledger_core::{LedgerError, BALANCE_EPSILON};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Expected-balance collaborator returning a fixed business-level total.
struct FixedSource(Decimal);

#[async_trait]
impl ExpectedBalanceSource for FixedSource {
    async fn expected_balance(&self) -> Result<Decimal, anyhow::Error> {
        Ok(self.0)
    }
}

/// Collaborator whose backing query fails.
struct FailingSource;

#[async_trait]
impl ExpectedBalanceSource for FailingSource {
    async fn expected_balance(&self) -> Result<Decimal, anyhow::Error> {
        Err(anyhow::anyhow!("unpaid-expense query failed"))
    }
}

/// Book three unpaid expenses totaling 200 against accounts payable.
async fn book_unpaid_expenses(ledger: &ledger_core::Ledger) {
    for (day, amount) in [(5, dec!(100)), (12, dec!(60)), (19, dec!(40))] {
        post_transfer(
            ledger,
            date(2026, 1, day),
            "5000",
            "2000",
            amount,
            EntrySource::ExpensePayment,
        )
        .await;
    }
}

#[tokio::test]
async fn drift_on_payable_control_is_corrected() {
    let ledger = ledger_with_chart().await;
    book_unpaid_expenses(&ledger).await;

    // Business records say 250 is owed; the ledger only carries 200.
    let outcome = ledger
        .reconcile("2000", &FixedSource(dec!(250)))
        .await
        .expect("Reconciliation should succeed");

    let correction = match outcome {
        ReconciliationOutcome::Corrected {
            expected,
            actual,
            difference,
            correction,
        } => {
            assert_eq!(expected, dec!(250));
            assert_eq!(actual, dec!(200));
            assert_eq!(difference, dec!(50));
            correction
        }
        other => panic!("Expected a correction, got {:?}", other),
    };

    assert_eq!(correction.source, EntrySource::Manual);
    assert!(correction
        .reference
        .as_deref()
        .expect("Correction must carry a reference")
        .starts_with("2000_CORRECTION"));
    assert!(correction.is_balanced(BALANCE_EPSILON));

    let payable = ledger
        .balance("2000", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    assert_eq!(payable, dec!(250));

    // The offset lands on the suspense account and the books still balance.
    ledger
        .verify_integrity(None)
        .await
        .expect("Trial balance must still sum to zero");
}

#[tokio::test]
async fn matching_balances_reconcile_without_action() {
    let ledger = ledger_with_chart().await;
    book_unpaid_expenses(&ledger).await;

    let outcome = ledger
        .reconcile("2000", &FixedSource(dec!(200)))
        .await
        .expect("Reconciliation should succeed");

    match outcome {
        ReconciliationOutcome::Reconciled { expected, actual } => {
            assert_eq!(expected, dec!(200));
            assert_eq!(actual, dec!(200));
        }
        other => panic!("Expected no action, got {:?}", other),
    }

    let manual = ledger
        .list_entries(EntryFilter {
            source: Some(EntrySource::Manual),
            ..Default::default()
        })
        .await
        .expect("Failed to list entries");
    assert!(manual.is_empty(), "No correction may be posted");
}

#[tokio::test]
async fn reconciliation_is_idempotent() {
    let ledger = ledger_with_chart().await;
    book_unpaid_expenses(&ledger).await;

    let source = FixedSource(dec!(250));

    let first = ledger
        .reconcile("2000", &source)
        .await
        .expect("First run should succeed");
    assert!(matches!(first, ReconciliationOutcome::Corrected { .. }));

    // Re-running with no intervening entries computes a zero difference.
    let second = ledger
        .reconcile("2000", &source)
        .await
        .expect("Second run should succeed");
    assert!(matches!(second, ReconciliationOutcome::Reconciled { .. }));

    let manual = ledger
        .list_entries(EntryFilter {
            source: Some(EntrySource::Manual),
            ..Default::default()
        })
        .await
        .expect("Failed to list entries");
    assert_eq!(manual.len(), 1, "Exactly one correction may exist");
}

#[tokio::test]
async fn fails_closed_when_source_unavailable() {
    let ledger = ledger_with_chart().await;
    book_unpaid_expenses(&ledger).await;

    let result = ledger.reconcile("2000", &FailingSource).await;
    assert!(matches!(
        result,
        Err(LedgerError::ReconciliationSourceUnavailable(_))
    ));

    // No correction may be proposed from incomplete data.
    let manual = ledger
        .list_entries(EntryFilter {
            source: Some(EntrySource::Manual),
            ..Default::default()
        })
        .await
        .expect("Failed to list entries");
    assert!(manual.is_empty());
}

#[tokio::test]
async fn corrects_debit_normal_control_downward() {
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

    // Debtor records only support 150 outstanding.
    let outcome = ledger
        .reconcile("1100", &FixedSource(dec!(150)))
        .await
        .expect("Reconciliation should succeed");

    match outcome {
        ReconciliationOutcome::Corrected { difference, .. } => {
            assert_eq!(difference, dec!(-30));
        }
        other => panic!("Expected a correction, got {:?}", other),
    }

    let receivable = ledger
        .balance("1100", BalanceQuery::default())
        .await
        .expect("Failed to compute balance");
    assert_eq!(receivable, dec!(150));

    ledger
        .verify_integrity(None)
        .await
        .expect("Trial balance must still sum to zero");
}

#[tokio::test]
async fn unknown_control_account_errors() {
    let ledger = ledger_with_chart().await;

    let result = ledger.reconcile("9998", &FixedSource(dec!(0))).await;
    assert!(matches!(result, Err(LedgerError::UnknownAccount(code)) if code == "9998"));
}
