//! Financial statements, derived purely from the balance engine.

use crate::error::LedgerError;
use crate::ledger::balance::{signed_balance, BalanceEngine, BalanceQuery};
use crate::models::{Account, AccountType, NormalSide};
use crate::store::LedgerStore;
use crate::BALANCE_EPSILON;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Default aging buckets in days: current, 31-60, 61-90, over 90.
pub const DEFAULT_AGING_BUCKETS: [i64; 3] = [30, 60, 90];

/// One account line of a statement section.
#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    pub code: String,
    pub name: String,
    pub balance: Decimal,
}

/// Balance sheet as of a date.
///
/// `current_earnings` carries undistributed net income so a consistent
/// ledger balances without closing entries. `is_balanced == false` is a
/// surfaced integrity problem, never a silently tolerated one.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSheet {
    pub as_of: NaiveDate,
    pub assets: Vec<AccountBalance>,
    pub liabilities: Vec<AccountBalance>,
    pub equity: Vec<AccountBalance>,
    pub current_earnings: Decimal,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub total_equity: Decimal,
    pub is_balanced: bool,
}

/// Income statement over a date range.
#[derive(Debug, Clone, Serialize)]
pub struct IncomeStatement {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub income: Vec<AccountBalance>,
    pub expenses: Vec<AccountBalance>,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_income: Decimal,
}

/// One open sub-account bucketed by age.
#[derive(Debug, Clone, Serialize)]
pub struct AgingRow {
    pub account_code: String,
    pub account_name: String,
    /// One amount per bucket; buckets are `boundaries.len() + 1` wide.
    pub buckets: Vec<Decimal>,
    pub total: Decimal,
}

/// AR/AP aging for one control account's sub-ledger.
#[derive(Debug, Clone, Serialize)]
pub struct AgingReport {
    pub control_code: String,
    pub as_of: NaiveDate,
    pub boundaries: Vec<i64>,
    pub rows: Vec<AgingRow>,
    pub bucket_totals: Vec<Decimal>,
    pub total: Decimal,
}

#[derive(Clone)]
pub struct StatementBuilder {
    store: Arc<dyn LedgerStore>,
    engine: BalanceEngine,
}

impl StatementBuilder {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        let engine = BalanceEngine::new(store.clone());
        Self { store, engine }
    }

    /// Balance sheet as of `as_of`, partitioned by account type with
    /// sub-accounts rolled into their root accounts.
    #[instrument(skip(self))]
    pub async fn balance_sheet(&self, as_of: NaiveDate) -> Result<BalanceSheet, LedgerError> {
        let accounts = self.store.list_accounts().await?;
        let query = BalanceQuery {
            as_of: Some(as_of),
            include_children: true,
        };

        let mut assets = Vec::new();
        let mut liabilities = Vec::new();
        let mut equity = Vec::new();
        let mut income_total = Decimal::ZERO;
        let mut expense_total = Decimal::ZERO;

        for account in accounts.iter().filter(|a| a.parent_code.is_none()) {
            let balance = self.engine.balance(&account.code, query).await?;
            let line = AccountBalance {
                code: account.code.clone(),
                name: account.name.clone(),
                balance,
            };
            match account.account_type {
                AccountType::Asset => assets.push(line),
                AccountType::Liability => liabilities.push(line),
                AccountType::Equity => equity.push(line),
                AccountType::Income => income_total += balance,
                AccountType::Expense => expense_total += balance,
            }
        }

        let current_earnings = income_total - expense_total;
        let total_assets: Decimal = assets.iter().map(|l| l.balance).sum();
        let total_liabilities: Decimal = liabilities.iter().map(|l| l.balance).sum();
        let total_equity: Decimal =
            equity.iter().map(|l| l.balance).sum::<Decimal>() + current_earnings;
        let is_balanced =
            (total_assets - (total_liabilities + total_equity)).abs() <= BALANCE_EPSILON;

        Ok(BalanceSheet {
            as_of,
            assets,
            liabilities,
            equity,
            current_earnings,
            total_assets,
            total_liabilities,
            total_equity,
            is_balanced,
        })
    }

    /// Income statement over entries dated within `start_date..=end_date`.
    #[instrument(skip(self))]
    pub async fn income_statement(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<IncomeStatement, LedgerError> {
        let totals = self
            .store
            .posted_totals(Some(start_date), Some(end_date))
            .await?;
        let accounts: HashMap<String, Account> = self
            .store
            .list_accounts()
            .await?
            .into_iter()
            .map(|a| (a.code.clone(), a))
            .collect();

        let mut income = Vec::new();
        let mut expenses = Vec::new();

        for t in totals {
            let Some(account) = accounts.get(&t.account_code) else {
                continue;
            };
            let line = AccountBalance {
                code: account.code.clone(),
                name: account.name.clone(),
                balance: signed_balance(account.account_type, t.debit, t.credit),
            };
            match account.account_type {
                AccountType::Income => income.push(line),
                AccountType::Expense => expenses.push(line),
                _ => {}
            }
        }

        let total_income: Decimal = income.iter().map(|l| l.balance).sum();
        let total_expenses: Decimal = expenses.iter().map(|l| l.balance).sum();

        Ok(IncomeStatement {
            start_date,
            end_date,
            income,
            expenses,
            total_income,
            total_expenses,
            net_income: total_income - total_expenses,
        })
    }

    /// Age the open sub-account balances under a control account.
    ///
    /// The outstanding balance of each account is attributed to its
    /// origination lines newest-first (payments settle the oldest charges
    /// first), so each row's buckets always sum to that account's balance.
    #[instrument(skip(self), fields(control_code = %control_code))]
    pub async fn aging_report(
        &self,
        control_code: &str,
        as_of: NaiveDate,
        boundaries: &[i64],
    ) -> Result<AgingReport, LedgerError> {
        let control = self
            .store
            .get_account(control_code)
            .await?
            .ok_or_else(|| LedgerError::UnknownAccount(control_code.to_string()))?;

        // Control account first, then the whole sub-account tree.
        let mut candidates = vec![control.clone()];
        let mut pending = self.store.list_children(control_code).await?;
        while let Some(child) = pending.pop() {
            pending.extend(self.store.list_children(&child.code).await?);
            candidates.push(child);
        }

        let bucket_count = boundaries.len() + 1;
        let mut rows = Vec::new();

        for account in candidates {
            let (debit, credit) = self
                .store
                .account_totals(&account.code, None, Some(as_of))
                .await?;
            let balance = signed_balance(account.account_type, debit, credit);
            if balance.abs() <= BALANCE_EPSILON {
                continue;
            }

            let mut buckets = vec![Decimal::ZERO; bucket_count];

            if balance < Decimal::ZERO {
                // Overpayment/prepayment: carried as a negative current amount.
                buckets[0] = balance;
            } else {
                let lines = self.store.account_lines(&account.code, Some(as_of)).await?;
                let mut remaining = balance;
                for line in lines.iter().rev() {
                    let amount = match account.account_type.normal_side() {
                        NormalSide::Debit => line.debit,
                        NormalSide::Credit => line.credit,
                    };
                    if amount.is_zero() {
                        continue;
                    }
                    let take = amount.min(remaining);
                    let age = (as_of - line.date).num_days();
                    let idx = boundaries
                        .iter()
                        .position(|b| age <= *b)
                        .unwrap_or(boundaries.len());
                    buckets[idx] += take;
                    remaining -= take;
                    if remaining.is_zero() {
                        break;
                    }
                }
                if remaining > Decimal::ZERO {
                    buckets[bucket_count - 1] += remaining;
                }
            }

            rows.push(AgingRow {
                account_code: account.code,
                account_name: account.name,
                buckets,
                total: balance,
            });
        }

        rows.sort_by(|a, b| a.account_code.cmp(&b.account_code));

        let mut bucket_totals = vec![Decimal::ZERO; bucket_count];
        for row in &rows {
            for (i, amount) in row.buckets.iter().enumerate() {
                bucket_totals[i] += *amount;
            }
        }
        let total = bucket_totals.iter().copied().sum();

        Ok(AgingReport {
            control_code: control.code,
            as_of,
            boundaries: boundaries.to_vec(),
            rows,
            bucket_totals,
            total,
        })
    }
}
