//! Reconciliation of ledger balances against business-level truth.
//!
//! A reconciliation run compares the expected balance supplied by an
//! external collaborator (unpaid-expense totals, debtor outstanding totals)
//! with the actual ledger balance of the corresponding control account. When
//! they drift apart, the gap is closed with one balanced correction entry
//! against the suspense account. The run fails closed when the expected
//! balance cannot be computed: no correction is ever proposed from
//! incomplete data.

use crate::error::LedgerError;
use crate::ledger::balance::{BalanceEngine, BalanceQuery};
use crate::ledger::posting::Journal;
use crate::ledger::registry::AccountRegistry;
use crate::models::{
    Account, AccountType, CreateAccount, EntrySource, NewEntry, NewLine, NormalSide,
    TransactionEntry,
};
use crate::services::metrics::RECONCILIATIONS_TOTAL;
use crate::store::LedgerStore;
use crate::BALANCE_EPSILON;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Account absorbing the offsetting side of a manual balance correction.
pub const SUSPENSE_ACCOUNT_CODE: &str = "3999";

/// Collaborator supplying the business-level expected balance for one
/// control account (e.g. the sum of unpaid expense records for AP).
#[async_trait]
pub trait ExpectedBalanceSource: Send + Sync {
    async fn expected_balance(&self) -> Result<Decimal, anyhow::Error>;
}

/// Terminal state of a reconciliation run.
#[derive(Debug, Clone)]
pub enum ReconciliationOutcome {
    /// Expected and actual agree within the policy epsilon; no action.
    Reconciled { expected: Decimal, actual: Decimal },
    /// Drift detected and closed with a correction entry.
    Corrected {
        expected: Decimal,
        actual: Decimal,
        difference: Decimal,
        correction: TransactionEntry,
    },
}

#[derive(Clone)]
pub struct Reconciler {
    registry: AccountRegistry,
    journal: Journal,
    engine: BalanceEngine,
    suspense_code: String,
}

impl Reconciler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            registry: AccountRegistry::new(store.clone()),
            journal: Journal::new(store.clone()),
            engine: BalanceEngine::new(store),
            suspense_code: SUSPENSE_ACCOUNT_CODE.to_string(),
        }
    }

    pub fn with_suspense_code(mut self, code: impl Into<String>) -> Self {
        self.suspense_code = code.into();
        self
    }

    /// Run one reconciliation for `control_code`. Idempotent: re-running
    /// after a correction computes a zero difference and does nothing.
    #[instrument(skip(self, source), fields(control_code = %control_code))]
    pub async fn reconcile(
        &self,
        control_code: &str,
        source: &dyn ExpectedBalanceSource,
    ) -> Result<ReconciliationOutcome, LedgerError> {
        let control = self.registry.resolve_account(control_code).await?;

        let expected = source.expected_balance().await.map_err(|e| {
            RECONCILIATIONS_TOTAL.with_label_values(&["failed"]).inc();
            LedgerError::ReconciliationSourceUnavailable(e)
        })?;

        let actual = self
            .engine
            .balance(control_code, BalanceQuery::default())
            .await?;

        let difference = expected - actual;
        if difference.abs() <= BALANCE_EPSILON {
            RECONCILIATIONS_TOTAL
                .with_label_values(&["reconciled"])
                .inc();
            info!(expected = %expected, actual = %actual, "Account reconciled");
            return Ok(ReconciliationOutcome::Reconciled { expected, actual });
        }

        warn!(
            expected = %expected,
            actual = %actual,
            difference = %difference,
            "Ledger drift detected, posting correction"
        );

        let correction = self.post_correction(&control, expected, actual).await?;

        RECONCILIATIONS_TOTAL
            .with_label_values(&["corrected"])
            .inc();

        Ok(ReconciliationOutcome::Corrected {
            expected,
            actual,
            difference,
            correction,
        })
    }

    /// Close the gap with one balanced entry between the control account and
    /// the suspense account.
    async fn post_correction(
        &self,
        control: &Account,
        expected: Decimal,
        actual: Decimal,
    ) -> Result<TransactionEntry, LedgerError> {
        let suspense = self.ensure_suspense_account().await?;

        let difference = expected - actual;
        let amount = difference.abs();
        // To raise a balance, post on the account's normal side.
        let debit_control = (control.account_type.normal_side() == NormalSide::Debit)
            == (difference > Decimal::ZERO);

        let description = format!("Balance correction for {}", control.name);
        let lines = if debit_control {
            vec![
                NewLine::debit(control.code.as_str(), amount, description.as_str()),
                NewLine::credit(suspense.code.as_str(), amount, description.as_str()),
            ]
        } else {
            vec![
                NewLine::credit(control.code.as_str(), amount, description.as_str()),
                NewLine::debit(suspense.code.as_str(), amount, description.as_str()),
            ]
        };

        let now = Utc::now();
        // Timestamped so repeated drift on one account never collides with
        // the (source, reference) uniqueness constraint.
        let reference = format!(
            "{}_CORRECTION_{}",
            control.code,
            now.format("%Y%m%d%H%M%S")
        );

        let entry = NewEntry::new(now.date_naive(), EntrySource::Manual, lines)
            .with_reference(reference)
            .with_metadata(json!({
                "reconciliation": control.code,
                "expected": expected,
                "actual": actual,
            }));

        self.journal.post_entry(entry).await
    }

    async fn ensure_suspense_account(&self) -> Result<Account, LedgerError> {
        match self.registry.resolve_account(&self.suspense_code).await {
            Ok(account) => Ok(account),
            Err(LedgerError::UnknownAccount(_)) => {
                self.registry
                    .create_account(CreateAccount::new(
                        self.suspense_code.clone(),
                        "Suspense",
                        AccountType::Equity,
                    ))
                    .await
            }
            Err(e) => Err(e),
        }
    }
}
