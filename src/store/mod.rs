//! Storage seam for the ledger.
//!
//! Components receive an explicit `Arc<dyn LedgerStore>` handle; there is no
//! ambient connection. The PostgreSQL backend enforces the idempotency and
//! uniqueness constraints at the database level; the in-memory backend mirrors
//! the same constraint behavior under a single write lock.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::LedgerError;
use crate::models::{Account, EntryFilter, EntrySource, EntryStatus, TransactionEntry};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::FromRow;

/// Per-account debit/credit totals over posted entries.
#[derive(Debug, Clone, FromRow)]
pub struct AccountTotals {
    pub account_code: String,
    pub debit: Decimal,
    pub credit: Decimal,
}

/// A dated line amount for one account, input to aging allocation.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct DatedLine {
    pub date: NaiveDate,
    pub debit: Decimal,
    pub credit: Decimal,
}

/// Storage backend for accounts and transaction entries.
///
/// Writes are atomic per call: an entry's transaction row and all of its
/// lines are never observed half-written, and `insert_entry` is the race
/// arbiter for `(source, reference)` uniqueness.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    /// Insert a new account. Fails with `DuplicateCode` if the code exists.
    async fn insert_account(&self, account: Account) -> Result<Account, LedgerError>;

    async fn get_account(&self, code: &str) -> Result<Option<Account>, LedgerError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError>;

    /// Direct children only; callers walk the tree for deeper roll-ups.
    async fn list_children(&self, parent_code: &str) -> Result<Vec<Account>, LedgerError>;

    /// Flip the soft-delete flag. Fails with `UnknownAccount` if absent.
    async fn set_account_active(&self, code: &str, active: bool) -> Result<Account, LedgerError>;

    /// Physically remove an account. Fails with `AccountNotEmpty` when any
    /// entry line (posted or void) references the code, or when child
    /// accounts still point at it.
    async fn delete_account(&self, code: &str) -> Result<(), LedgerError>;

    async fn account_has_entries(&self, code: &str) -> Result<bool, LedgerError>;

    // -------------------------------------------------------------------------
    // Entries
    // -------------------------------------------------------------------------

    /// Append one validated entry atomically. A colliding non-void
    /// `(source, reference)` pair fails with `DuplicateReference`.
    async fn insert_entry(
        &self,
        entry: TransactionEntry,
    ) -> Result<TransactionEntry, LedgerError>;

    async fn get_entry(
        &self,
        transaction_id: &str,
    ) -> Result<Option<TransactionEntry>, LedgerError>;

    async fn set_entry_status(
        &self,
        transaction_id: &str,
        status: EntryStatus,
    ) -> Result<TransactionEntry, LedgerError>;

    /// Non-void entry for an idempotency key, if any.
    async fn find_by_reference(
        &self,
        source: EntrySource,
        reference: &str,
    ) -> Result<Option<TransactionEntry>, LedgerError>;

    async fn find_by_source(
        &self,
        source: EntrySource,
        source_id: &str,
    ) -> Result<Vec<TransactionEntry>, LedgerError>;

    async fn list_entries(
        &self,
        filter: EntryFilter,
    ) -> Result<Vec<TransactionEntry>, LedgerError>;

    // -------------------------------------------------------------------------
    // Aggregation (posted entries only)
    // -------------------------------------------------------------------------

    /// `(debit, credit)` sums for one account over `start..=as_of`.
    async fn account_totals(
        &self,
        code: &str,
        start: Option<NaiveDate>,
        as_of: Option<NaiveDate>,
    ) -> Result<(Decimal, Decimal), LedgerError>;

    /// Totals grouped by account code for every account with at least one
    /// posted line in the window.
    async fn posted_totals(
        &self,
        start: Option<NaiveDate>,
        as_of: Option<NaiveDate>,
    ) -> Result<Vec<AccountTotals>, LedgerError>;

    /// Dated line amounts for one account up to `as_of`, oldest first.
    async fn account_lines(
        &self,
        code: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<Vec<DatedLine>, LedgerError>;
}
