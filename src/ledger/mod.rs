//! Ledger components: account registry, journal, balance engine, statement
//! builder, and the reconciliation protocol.

pub mod balance;
pub mod posting;
pub mod reconcile;
pub mod registry;
pub mod statement;

pub use balance::{signed_balance, BalanceEngine, BalanceQuery, TrialBalance};
pub use posting::Journal;
pub use reconcile::{
    ExpectedBalanceSource, ReconciliationOutcome, Reconciler, SUSPENSE_ACCOUNT_CODE,
};
pub use registry::AccountRegistry;
pub use statement::{
    AccountBalance, AgingReport, AgingRow, BalanceSheet, IncomeStatement, StatementBuilder,
    DEFAULT_AGING_BUCKETS,
};

use crate::error::LedgerError;
use crate::models::{EntryFilter, NewEntry, TransactionEntry};
use crate::store::LedgerStore;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Facade over the five ledger components sharing one storage handle.
///
/// This is the stable API surface consumed by the business-event
/// collaborators; the individual components remain reachable through the
/// accessors for callers that need the finer-grained contracts.
#[derive(Clone)]
pub struct Ledger {
    registry: AccountRegistry,
    journal: Journal,
    balances: BalanceEngine,
    statements: StatementBuilder,
    reconciler: Reconciler,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            registry: AccountRegistry::new(store.clone()),
            journal: Journal::new(store.clone()),
            balances: BalanceEngine::new(store.clone()),
            statements: StatementBuilder::new(store.clone()),
            reconciler: Reconciler::new(store),
        }
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn balances(&self) -> &BalanceEngine {
        &self.balances
    }

    pub fn statements(&self) -> &StatementBuilder {
        &self.statements
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    // -------------------------------------------------------------------------
    // Convenience passthroughs
    // -------------------------------------------------------------------------

    pub async fn post_entry(&self, input: NewEntry) -> Result<TransactionEntry, LedgerError> {
        self.journal.post_entry(input).await
    }

    pub async fn post_entry_if_absent(
        &self,
        input: NewEntry,
    ) -> Result<TransactionEntry, LedgerError> {
        self.journal.post_entry_if_absent(input).await
    }

    pub async fn void_entry(&self, transaction_id: &str) -> Result<TransactionEntry, LedgerError> {
        self.journal.void_entry(transaction_id).await
    }

    pub async fn list_entries(
        &self,
        filter: EntryFilter,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        self.journal.list_entries(filter).await
    }

    pub async fn balance(&self, code: &str, query: BalanceQuery) -> Result<Decimal, LedgerError> {
        self.balances.balance(code, query).await
    }

    pub async fn trial_balance(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<TrialBalance, LedgerError> {
        self.balances.trial_balance(as_of).await
    }

    pub async fn verify_integrity(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<TrialBalance, LedgerError> {
        self.balances.verify_integrity(as_of).await
    }

    pub async fn balance_sheet(&self, as_of: NaiveDate) -> Result<BalanceSheet, LedgerError> {
        self.statements.balance_sheet(as_of).await
    }

    pub async fn income_statement(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<IncomeStatement, LedgerError> {
        self.statements.income_statement(start_date, end_date).await
    }

    pub async fn aging_report(
        &self,
        control_code: &str,
        as_of: NaiveDate,
    ) -> Result<AgingReport, LedgerError> {
        self.statements
            .aging_report(control_code, as_of, &DEFAULT_AGING_BUCKETS)
            .await
    }

    pub async fn reconcile(
        &self,
        control_code: &str,
        source: &dyn ExpectedBalanceSource,
    ) -> Result<ReconciliationOutcome, LedgerError> {
        self.reconciler.reconcile(control_code, source).await
    }
}
