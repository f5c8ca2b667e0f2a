//! Balance computation.
//!
//! The normal-side sign convention lives here and nowhere else: debit-normal
//! accounts (asset, expense) report `debits - credits`, credit-normal
//! accounts (liability, equity, income) report `credits - debits`. Statement
//! and reconciliation code never flips a sign on its own.

use crate::error::LedgerError;
use crate::models::{Account, AccountType, NormalSide};
use crate::store::LedgerStore;
use crate::BALANCE_EPSILON;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, instrument};

/// Signed balance for an account type given raw debit/credit sums.
pub fn signed_balance(account_type: AccountType, debit: Decimal, credit: Decimal) -> Decimal {
    match account_type.normal_side() {
        NormalSide::Debit => debit - credit,
        NormalSide::Credit => credit - debit,
    }
}

/// Parameters for a balance query.
#[derive(Debug, Clone, Copy)]
pub struct BalanceQuery {
    /// Inclusive upper bound on the accounting date; `None` means now.
    pub as_of: Option<NaiveDate>,
    /// Roll descendant sub-account balances into the result.
    pub include_children: bool,
}

impl Default for BalanceQuery {
    fn default() -> Self {
        Self {
            as_of: None,
            include_children: true,
        }
    }
}

impl BalanceQuery {
    pub fn as_of(date: NaiveDate) -> Self {
        Self {
            as_of: Some(date),
            ..Self::default()
        }
    }

    pub fn direct_only() -> Self {
        Self {
            as_of: None,
            include_children: false,
        }
    }
}

/// Raw trial balance: `debits - credits` per account with at least one
/// posted line. Direct entries only; rolling children up here would count
/// them twice.
#[derive(Debug, Clone)]
pub struct TrialBalance {
    pub as_of: Option<NaiveDate>,
    pub balances: BTreeMap<String, Decimal>,
}

impl TrialBalance {
    /// Sum of all raw balances; zero in a correct ledger.
    pub fn total(&self) -> Decimal {
        self.balances.values().copied().sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total().abs() <= BALANCE_EPSILON
    }
}

#[derive(Clone)]
pub struct BalanceEngine {
    store: Arc<dyn LedgerStore>,
}

impl BalanceEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Signed balance of one account, optionally rolled up over its
    /// sub-account tree. Children share the parent's type, so the sign
    /// convention is uniform across the roll-up.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn balance(&self, code: &str, query: BalanceQuery) -> Result<Decimal, LedgerError> {
        let account = self
            .store
            .get_account(code)
            .await?
            .ok_or_else(|| LedgerError::UnknownAccount(code.to_string()))?;

        let mut total = self.direct_balance(&account, query.as_of).await?;

        if query.include_children {
            let mut pending = self.store.list_children(code).await?;
            while let Some(child) = pending.pop() {
                total += self.direct_balance(&child, query.as_of).await?;
                pending.extend(self.store.list_children(&child.code).await?);
            }
        }

        Ok(total)
    }

    async fn direct_balance(
        &self,
        account: &Account,
        as_of: Option<NaiveDate>,
    ) -> Result<Decimal, LedgerError> {
        let (debit, credit) = self
            .store
            .account_totals(&account.code, None, as_of)
            .await?;
        Ok(signed_balance(account.account_type, debit, credit))
    }

    /// Raw trial balance over every account with posted entries.
    pub async fn trial_balance(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<TrialBalance, LedgerError> {
        let totals = self.store.posted_totals(None, as_of).await?;
        let balances = totals
            .into_iter()
            .map(|t| (t.account_code, t.debit - t.credit))
            .collect();
        Ok(TrialBalance { as_of, balances })
    }

    /// Full-scan integrity check: the trial balance must sum to zero.
    /// A nonzero total is a systemic alarm, surfaced as `LedgerIntegrity`.
    #[instrument(skip(self))]
    pub async fn verify_integrity(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<TrialBalance, LedgerError> {
        let trial = self.trial_balance(as_of).await?;
        let total = trial.total();
        if total.abs() > BALANCE_EPSILON {
            error!(total = %total, "Trial balance does not sum to zero");
            return Err(LedgerError::LedgerIntegrity(total));
        }
        Ok(trial)
    }
}
