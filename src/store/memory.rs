//! In-memory ledger store.
//!
//! Single `RwLock`-guarded state; every write is one critical section, which
//! makes entry appends atomic and the `(source, reference)` check a rejected
//! write rather than a racy find-then-insert. Used embedded and by the
//! integration tests.

use crate::error::LedgerError;
use crate::models::{
    Account, EntryFilter, EntrySource, EntryStatus, TransactionEntry,
};
use crate::store::{AccountTotals, DatedLine, LedgerStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    accounts: BTreeMap<String, Account>,
    entries: Vec<TransactionEntry>,
    by_id: HashMap<String, usize>,
    // Non-void idempotency index: (source, reference) -> transaction_id.
    by_reference: HashMap<(EntrySource, String), String>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_window(date: NaiveDate, start: Option<NaiveDate>, as_of: Option<NaiveDate>) -> bool {
    start.map_or(true, |s| date >= s) && as_of.map_or(true, |e| date <= e)
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_account(&self, account: Account) -> Result<Account, LedgerError> {
        let mut inner = self.inner.write().expect("ledger store lock poisoned");
        if inner.accounts.contains_key(&account.code) {
            return Err(LedgerError::DuplicateCode(account.code));
        }
        inner.accounts.insert(account.code.clone(), account.clone());
        Ok(account)
    }

    async fn get_account(&self, code: &str) -> Result<Option<Account>, LedgerError> {
        let inner = self.inner.read().expect("ledger store lock poisoned");
        Ok(inner.accounts.get(code).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let inner = self.inner.read().expect("ledger store lock poisoned");
        Ok(inner.accounts.values().cloned().collect())
    }

    async fn list_children(&self, parent_code: &str) -> Result<Vec<Account>, LedgerError> {
        let inner = self.inner.read().expect("ledger store lock poisoned");
        Ok(inner
            .accounts
            .values()
            .filter(|a| a.parent_code.as_deref() == Some(parent_code))
            .cloned()
            .collect())
    }

    async fn set_account_active(&self, code: &str, active: bool) -> Result<Account, LedgerError> {
        let mut inner = self.inner.write().expect("ledger store lock poisoned");
        let account = inner
            .accounts
            .get_mut(code)
            .ok_or_else(|| LedgerError::UnknownAccount(code.to_string()))?;
        account.is_active = active;
        Ok(account.clone())
    }

    async fn delete_account(&self, code: &str) -> Result<(), LedgerError> {
        let mut inner = self.inner.write().expect("ledger store lock poisoned");
        if !inner.accounts.contains_key(code) {
            return Err(LedgerError::UnknownAccount(code.to_string()));
        }
        let referenced = inner
            .entries
            .iter()
            .any(|e| e.lines.iter().any(|l| l.account_code == code));
        let has_children = inner
            .accounts
            .values()
            .any(|a| a.parent_code.as_deref() == Some(code));
        if referenced || has_children {
            return Err(LedgerError::AccountNotEmpty(code.to_string()));
        }
        inner.accounts.remove(code);
        Ok(())
    }

    async fn account_has_entries(&self, code: &str) -> Result<bool, LedgerError> {
        let inner = self.inner.read().expect("ledger store lock poisoned");
        Ok(inner
            .entries
            .iter()
            .any(|e| e.lines.iter().any(|l| l.account_code == code)))
    }

    async fn insert_entry(
        &self,
        entry: TransactionEntry,
    ) -> Result<TransactionEntry, LedgerError> {
        let mut inner = self.inner.write().expect("ledger store lock poisoned");
        if let Some(reference) = &entry.reference {
            let key = (entry.source, reference.clone());
            if inner.by_reference.contains_key(&key) {
                return Err(LedgerError::DuplicateReference {
                    origin: entry.source.to_string(),
                    reference: reference.clone(),
                });
            }
            if entry.status == EntryStatus::Posted {
                inner
                    .by_reference
                    .insert(key, entry.transaction_id.clone());
            }
        }
        let index = inner.entries.len();
        inner.by_id.insert(entry.transaction_id.clone(), index);
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_entry(
        &self,
        transaction_id: &str,
    ) -> Result<Option<TransactionEntry>, LedgerError> {
        let inner = self.inner.read().expect("ledger store lock poisoned");
        Ok(inner
            .by_id
            .get(transaction_id)
            .map(|&i| inner.entries[i].clone()))
    }

    async fn set_entry_status(
        &self,
        transaction_id: &str,
        status: EntryStatus,
    ) -> Result<TransactionEntry, LedgerError> {
        let mut inner = self.inner.write().expect("ledger store lock poisoned");
        let index = *inner.by_id.get(transaction_id).ok_or_else(|| {
            LedgerError::NotFound(anyhow::anyhow!("transaction {} not found", transaction_id))
        })?;
        let source = inner.entries[index].source;
        let key = inner.entries[index]
            .reference
            .clone()
            .map(|r| (source, r));
        match status {
            EntryStatus::Void => {
                // Voiding releases the idempotency key for a replacement.
                if let Some(key) = key {
                    if inner.by_reference.get(&key).map(String::as_str) == Some(transaction_id) {
                        inner.by_reference.remove(&key);
                    }
                }
            }
            EntryStatus::Posted => {
                if let Some(key) = key {
                    match inner.by_reference.get(&key).cloned() {
                        Some(existing) if existing != transaction_id => {
                            return Err(LedgerError::DuplicateReference {
                                origin: key.0.to_string(),
                                reference: key.1,
                            });
                        }
                        Some(_) => {}
                        None => {
                            inner.by_reference.insert(key, transaction_id.to_string());
                        }
                    }
                }
            }
        }
        inner.entries[index].status = status;
        Ok(inner.entries[index].clone())
    }

    async fn find_by_reference(
        &self,
        source: EntrySource,
        reference: &str,
    ) -> Result<Option<TransactionEntry>, LedgerError> {
        let inner = self.inner.read().expect("ledger store lock poisoned");
        let key = (source, reference.to_string());
        Ok(inner
            .by_reference
            .get(&key)
            .and_then(|id| inner.by_id.get(id))
            .map(|&i| inner.entries[i].clone()))
    }

    async fn find_by_source(
        &self,
        source: EntrySource,
        source_id: &str,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        let inner = self.inner.read().expect("ledger store lock poisoned");
        Ok(inner
            .entries
            .iter()
            .filter(|e| {
                e.source == source
                    && e.source_ref
                        .as_ref()
                        .map_or(false, |r| r.id == source_id)
            })
            .cloned()
            .collect())
    }

    async fn list_entries(
        &self,
        filter: EntryFilter,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        let inner = self.inner.read().expect("ledger store lock poisoned");
        Ok(inner
            .entries
            .iter()
            .filter(|e| {
                (filter.include_void || e.status == EntryStatus::Posted)
                    && filter.source.map_or(true, |s| e.source == s)
                    && in_window(e.date, filter.start_date, filter.end_date)
            })
            .cloned()
            .collect())
    }

    async fn account_totals(
        &self,
        code: &str,
        start: Option<NaiveDate>,
        as_of: Option<NaiveDate>,
    ) -> Result<(Decimal, Decimal), LedgerError> {
        let inner = self.inner.read().expect("ledger store lock poisoned");
        let mut debit = Decimal::ZERO;
        let mut credit = Decimal::ZERO;
        for entry in inner
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Posted && in_window(e.date, start, as_of))
        {
            for line in entry.lines.iter().filter(|l| l.account_code == code) {
                debit += line.debit;
                credit += line.credit;
            }
        }
        Ok((debit, credit))
    }

    async fn posted_totals(
        &self,
        start: Option<NaiveDate>,
        as_of: Option<NaiveDate>,
    ) -> Result<Vec<AccountTotals>, LedgerError> {
        let inner = self.inner.read().expect("ledger store lock poisoned");
        let mut totals: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
        for entry in inner
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Posted && in_window(e.date, start, as_of))
        {
            for line in &entry.lines {
                let slot = totals
                    .entry(line.account_code.clone())
                    .or_insert((Decimal::ZERO, Decimal::ZERO));
                slot.0 += line.debit;
                slot.1 += line.credit;
            }
        }
        Ok(totals
            .into_iter()
            .map(|(account_code, (debit, credit))| AccountTotals {
                account_code,
                debit,
                credit,
            })
            .collect())
    }

    async fn account_lines(
        &self,
        code: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<Vec<DatedLine>, LedgerError> {
        let inner = self.inner.read().expect("ledger store lock poisoned");
        let mut lines: Vec<DatedLine> = inner
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Posted && in_window(e.date, None, as_of))
            .flat_map(|e| {
                e.lines
                    .iter()
                    .filter(|l| l.account_code == code)
                    .map(|l| DatedLine {
                        date: e.date,
                        debit: l.debit,
                        credit: l.credit,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        lines.sort_by_key(|l| l.date);
        Ok(lines)
    }
}
