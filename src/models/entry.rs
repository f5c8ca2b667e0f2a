//! Transaction entry model for double-entry accounting.
//!
//! Entries are append-only: fixing a mistake means posting a balancing
//! correction or voiding the entry, never mutating a posted amount.

use crate::models::AccountType;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Originating business process for a transaction entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Payment,
    ExpensePayment,
    RentalAccrual,
    RentalAccrualReversal,
    Refund,
    Manual,
}

impl EntrySource {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::ExpensePayment => "expense_payment",
            Self::RentalAccrual => "rental_accrual",
            Self::RentalAccrualReversal => "rental_accrual_reversal",
            Self::Refund => "refund",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment" => Some(Self::Payment),
            "expense_payment" => Some(Self::ExpensePayment),
            "rental_accrual" => Some(Self::RentalAccrual),
            "rental_accrual_reversal" => Some(Self::RentalAccrualReversal),
            "refund" => Some(Self::Refund),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry lifecycle. Only `Posted` entries count toward balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Posted,
    Void,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "posted",
            Self::Void => "void",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Weak reference to the originating business record (a payment, an expense,
/// a refund). Traceability only, never an ownership pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub model: String,
}

impl SourceRef {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
        }
    }
}

/// Single line of a transaction entry.
///
/// Invariant: `debit >= 0`, `credit >= 0`, exactly one side nonzero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryLine {
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: String,
}

/// Balanced set of line items recorded against the chart of accounts.
///
/// `date` is the accounting date and decides the reporting period;
/// `posted_utc` is the wall-clock creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub transaction_id: String,
    pub date: NaiveDate,
    pub lines: Vec<EntryLine>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub source: EntrySource,
    pub source_ref: Option<SourceRef>,
    pub reference: Option<String>,
    pub status: EntryStatus,
    pub metadata: Option<serde_json::Value>,
    pub posted_utc: DateTime<Utc>,
}

impl TransactionEntry {
    /// Defense-in-depth check that the cached totals match the line sums.
    pub fn is_balanced(&self, epsilon: Decimal) -> bool {
        let debits: Decimal = self.lines.iter().map(|l| l.debit).sum();
        let credits: Decimal = self.lines.iter().map(|l| l.credit).sum();
        (debits - credits).abs() <= epsilon
            && (debits - self.total_debit).abs() <= epsilon
            && (credits - self.total_credit).abs() <= epsilon
    }
}

/// Caller-supplied line for a new entry; account name and type are resolved
/// from the registry at post time.
#[derive(Debug, Clone)]
pub struct NewLine {
    pub account_code: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: String,
}

impl NewLine {
    pub fn debit(
        account_code: impl Into<String>,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_code: account_code.into(),
            debit: amount,
            credit: Decimal::ZERO,
            description: description.into(),
        }
    }

    pub fn credit(
        account_code: impl Into<String>,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_code: account_code.into(),
            debit: Decimal::ZERO,
            credit: amount,
            description: description.into(),
        }
    }
}

/// Input for posting a new transaction entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub date: NaiveDate,
    pub lines: Vec<NewLine>,
    pub source: EntrySource,
    pub source_ref: Option<SourceRef>,
    pub reference: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewEntry {
    pub fn new(date: NaiveDate, source: EntrySource, lines: Vec<NewLine>) -> Self {
        Self {
            date,
            lines,
            source,
            source_ref: None,
            reference: None,
            metadata: None,
        }
    }

    pub fn with_source_ref(mut self, source_ref: SourceRef) -> Self {
        self.source_ref = Some(source_ref);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Filter for audit listings of the journal.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub source: Option<EntrySource>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub include_void: bool,
}
