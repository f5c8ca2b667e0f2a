//! Common test utilities for ledger-core integration tests.

use chrono::NaiveDate;
use ledger_core::ledger::Ledger;
use ledger_core::models::{EntrySource, NewEntry, NewLine, TransactionEntry};
use ledger_core::store::MemoryStore;
use rust_decimal::Decimal;
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,ledger_core=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Build a ledger over a fresh in-memory store.
pub fn ledger() -> Ledger {
    init_tracing();
    Ledger::new(Arc::new(MemoryStore::new()))
}

/// Build a ledger with the default chart of accounts installed.
pub async fn ledger_with_chart() -> Ledger {
    let ledger = ledger();
    ledger
        .registry()
        .bootstrap_chart()
        .await
        .expect("Failed to bootstrap chart");
    ledger
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Two-line entry moving `amount` between two accounts.
pub fn transfer(
    entry_date: NaiveDate,
    debit_code: &str,
    credit_code: &str,
    amount: Decimal,
    source: EntrySource,
) -> NewEntry {
    NewEntry::new(
        entry_date,
        source,
        vec![
            NewLine::debit(debit_code, amount, "test entry"),
            NewLine::credit(credit_code, amount, "test entry"),
        ],
    )
}

/// Post a two-line transfer, panicking on failure.
pub async fn post_transfer(
    ledger: &Ledger,
    entry_date: NaiveDate,
    debit_code: &str,
    credit_code: &str,
    amount: Decimal,
    source: EntrySource,
) -> TransactionEntry {
    ledger
        .post_entry(transfer(entry_date, debit_code, credit_code, amount, source))
        .await
        .expect("Failed to post entry")
}
