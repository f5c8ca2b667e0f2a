//! Double-entry accounting ledger core.
//!
//! Every financial event (rent accrual, payment, refund, expense, correction)
//! is recorded as a balanced set of debit/credit lines against a hierarchical
//! chart of accounts. Balances, financial statements, and reconciliation are
//! all derived from the same append-only journal.
//!
//! The crate is a library: callers inject a storage handle (`Arc<dyn
//! LedgerStore>`) into [`ledger::Ledger`] and get back the stable API surface
//! (post, balance, statements, reconcile). Two backends ship with the crate:
//! [`store::PgStore`] (PostgreSQL via sqlx) and [`store::MemoryStore`].

pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod services;
pub mod store;

pub use error::LedgerError;
pub use ledger::Ledger;

use rust_decimal::Decimal;

/// Tolerance for "balanced" / "matches" comparisons, in currency units.
///
/// Amounts are exact `Decimal`s end to end; the epsilon only bounds drift
/// accepted when comparing independently derived totals (entry balancing,
/// trial balance, reconciliation differences).
pub const BALANCE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
