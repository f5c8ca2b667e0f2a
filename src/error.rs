//! Error taxonomy for the ledger core.
//!
//! Every variant is returned to the caller; the ledger never auto-corrects.
//! Corrections only enter the books through the explicit reconciliation
//! protocol in [`crate::ledger::reconcile`].

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Unbalanced entry: debits ({debits}) != credits ({credits})")]
    UnbalancedEntry { debits: Decimal, credits: Decimal },

    #[error("Invalid entry line: {0}")]
    InvalidLine(anyhow::Error),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Inactive account: {0}")]
    InactiveAccount(String),

    #[error("Account code already exists: {0}")]
    DuplicateCode(String),

    #[error("Invalid parent account: {0}")]
    InvalidParent(anyhow::Error),

    #[error("Account {0} is referenced by ledger entries and cannot be removed")]
    AccountNotEmpty(String),

    #[error("Duplicate reference: {origin}/{reference}")]
    DuplicateReference { origin: String, reference: String },

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Ledger integrity violation: trial balance off by {0}")]
    LedgerIntegrity(Decimal),

    #[error("Reconciliation source unavailable: {0}")]
    ReconciliationSourceUnavailable(anyhow::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}
