//! Append-only journal of balanced transaction entries.
//!
//! All validation happens here, before anything touches storage: line shape,
//! account resolution, and the balanced-entry invariant. The storage layer
//! arbitrates `(source, reference)` uniqueness so two concurrent posts for
//! the same business event cannot both land.

use crate::error::LedgerError;
use crate::models::{
    EntryFilter, EntryLine, EntrySource, EntryStatus, NewEntry, TransactionEntry,
};
use crate::services::metrics::ENTRIES_POSTED_TOTAL;
use crate::store::LedgerStore;
use crate::BALANCE_EPSILON;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct Journal {
    store: Arc<dyn LedgerStore>,
}

impl Journal {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Validate and append one entry. A colliding `(source, reference)` is
    /// rejected with `DuplicateReference`.
    #[instrument(skip(self, input), fields(source = %input.source, line_count = input.lines.len()))]
    pub async fn post_entry(&self, input: NewEntry) -> Result<TransactionEntry, LedgerError> {
        let entry = self.validate(input).await?;

        match self.store.insert_entry(entry).await {
            Ok(entry) => {
                ENTRIES_POSTED_TOTAL.with_label_values(&["ok"]).inc();
                info!(
                    transaction_id = %entry.transaction_id,
                    source = %entry.source,
                    total = %entry.total_debit,
                    "Entry posted"
                );
                Ok(entry)
            }
            Err(e) => {
                ENTRIES_POSTED_TOTAL.with_label_values(&["error"]).inc();
                Err(e)
            }
        }
    }

    /// Atomic post-if-absent keyed on `(source, reference)`: when another
    /// entry already holds the key, that entry is returned instead.
    #[instrument(skip(self, input), fields(source = %input.source))]
    pub async fn post_entry_if_absent(
        &self,
        input: NewEntry,
    ) -> Result<TransactionEntry, LedgerError> {
        let source = input.source;
        let reference = input.reference.clone();

        match self.post_entry(input).await {
            Ok(entry) => Ok(entry),
            Err(LedgerError::DuplicateReference { .. }) => {
                let reference = reference.unwrap_or_default();
                match self.store.find_by_reference(source, &reference).await? {
                    Some(existing) => Ok(existing),
                    None => Err(LedgerError::DuplicateReference {
                        origin: source.to_string(),
                        reference,
                    }),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Mark an entry void. The entry stays in the journal for audit but is
    /// excluded from every subsequent balance computation. Voiding a voided
    /// entry is a no-op.
    #[instrument(skip(self))]
    pub async fn void_entry(&self, transaction_id: &str) -> Result<TransactionEntry, LedgerError> {
        let existing = self.store.get_entry(transaction_id).await?.ok_or_else(|| {
            LedgerError::NotFound(anyhow::anyhow!("transaction {} not found", transaction_id))
        })?;

        if existing.status == EntryStatus::Void {
            return Ok(existing);
        }

        let voided = self
            .store
            .set_entry_status(transaction_id, EntryStatus::Void)
            .await?;

        warn!(
            transaction_id = %transaction_id,
            source = %voided.source,
            total = %voided.total_debit,
            "Entry voided"
        );

        Ok(voided)
    }

    pub async fn get_entry(
        &self,
        transaction_id: &str,
    ) -> Result<Option<TransactionEntry>, LedgerError> {
        self.store.get_entry(transaction_id).await
    }

    /// Non-void entry for an idempotency key, if any.
    pub async fn find_by_reference(
        &self,
        source: EntrySource,
        reference: &str,
    ) -> Result<Option<TransactionEntry>, LedgerError> {
        self.store.find_by_reference(source, reference).await
    }

    /// All entries attributed to one business record, for traceability and
    /// re-derivation when the source is edited.
    pub async fn find_by_source(
        &self,
        source: EntrySource,
        source_id: &str,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        self.store.find_by_source(source, source_id).await
    }

    pub async fn list_entries(
        &self,
        filter: EntryFilter,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        self.store.list_entries(filter).await
    }

    async fn validate(&self, input: NewEntry) -> Result<TransactionEntry, LedgerError> {
        if input.lines.len() < 2 {
            return Err(LedgerError::InvalidLine(anyhow::anyhow!(
                "entry must have at least two lines"
            )));
        }

        let mut lines = Vec::with_capacity(input.lines.len());
        let mut debits = Decimal::ZERO;
        let mut credits = Decimal::ZERO;

        for line in &input.lines {
            if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
                return Err(LedgerError::InvalidLine(anyhow::anyhow!(
                    "line amounts must be non-negative (account {})",
                    line.account_code
                )));
            }
            if line.debit.is_zero() == line.credit.is_zero() {
                return Err(LedgerError::InvalidLine(anyhow::anyhow!(
                    "exactly one of debit/credit must be nonzero (account {})",
                    line.account_code
                )));
            }

            let account = self
                .store
                .get_account(&line.account_code)
                .await?
                .ok_or_else(|| LedgerError::UnknownAccount(line.account_code.clone()))?;
            if !account.is_active {
                return Err(LedgerError::InactiveAccount(account.code));
            }

            debits += line.debit;
            credits += line.credit;

            lines.push(EntryLine {
                account_code: account.code,
                account_name: account.name,
                account_type: account.account_type,
                debit: line.debit,
                credit: line.credit,
                description: line.description.clone(),
            });
        }

        if (debits - credits).abs() > BALANCE_EPSILON {
            return Err(LedgerError::UnbalancedEntry { debits, credits });
        }

        let now = Utc::now();
        Ok(TransactionEntry {
            transaction_id: generate_transaction_id(now),
            date: input.date,
            lines,
            total_debit: debits,
            total_credit: credits,
            source: input.source,
            source_ref: input.source_ref,
            reference: input.reference,
            status: EntryStatus::Posted,
            metadata: input.metadata,
            posted_utc: now,
        })
    }
}

/// Human-and-machine-readable transaction identifier:
/// `TXN-<yyyymmddHHMMSS>-<random suffix>`.
fn generate_transaction_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!(
        "TXN-{}-{}",
        now.format("%Y%m%d%H%M%S"),
        suffix.to_lowercase()
    )
}
