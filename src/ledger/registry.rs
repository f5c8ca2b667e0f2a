//! Chart of accounts.
//!
//! Accounts form a tree for roll-up aggregation: per-counterparty
//! sub-accounts (`1100-<entity>`) hang off a control account and are created
//! lazily by whoever first needs them. Creation is the only mutation besides
//! the soft-delete flag; codes never change.

use crate::error::LedgerError;
use crate::models::{Account, AccountType, CreateAccount};
use crate::services::metrics::ACCOUNTS_CREATED;
use crate::store::LedgerStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

/// Default chart for a property-management ledger.
const DEFAULT_CHART: &[(&str, &str, AccountType, Option<&str>)] = &[
    ("1000", "Bank", AccountType::Asset, None),
    ("1100", "Accounts Receivable", AccountType::Asset, None),
    ("2000", "Accounts Payable", AccountType::Liability, None),
    ("2100", "Tenant Deposits", AccountType::Liability, None),
    ("3000", "Owner Equity", AccountType::Equity, None),
    ("3999", "Suspense", AccountType::Equity, None),
    ("4001", "Rental Income", AccountType::Income, None),
    ("4100", "Other Income", AccountType::Income, None),
    ("5000", "Maintenance Expense", AccountType::Expense, None),
    ("5100", "Utilities Expense", AccountType::Expense, None),
    ("5200", "Administrative Expense", AccountType::Expense, None),
];

#[derive(Clone)]
pub struct AccountRegistry {
    store: Arc<dyn LedgerStore>,
}

impl AccountRegistry {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Create a new account.
    #[instrument(skip(self, input), fields(code = %input.code, account_type = %input.account_type))]
    pub async fn create_account(&self, input: CreateAccount) -> Result<Account, LedgerError> {
        if let Some(parent_code) = &input.parent_code {
            let parent = self
                .store
                .get_account(parent_code)
                .await?
                .ok_or_else(|| {
                    LedgerError::InvalidParent(anyhow::anyhow!(
                        "parent account {} does not exist",
                        parent_code
                    ))
                })?;
            if !parent.is_active {
                return Err(LedgerError::InvalidParent(anyhow::anyhow!(
                    "parent account {} is inactive",
                    parent_code
                )));
            }
            if parent.account_type != input.account_type {
                return Err(LedgerError::InvalidParent(anyhow::anyhow!(
                    "parent account {} is {}, not {}",
                    parent_code,
                    parent.account_type,
                    input.account_type
                )));
            }
        }

        let account = Account {
            code: input.code,
            name: input.name,
            account_type: input.account_type,
            parent_code: input.parent_code,
            is_active: true,
            created_utc: Utc::now(),
        };

        let account = self.store.insert_account(account).await?;

        ACCOUNTS_CREATED
            .with_label_values(&[account.account_type.as_str()])
            .inc();

        info!(
            code = %account.code,
            account_type = %account.account_type,
            "Account created"
        );

        Ok(account)
    }

    /// Resolve an account by code.
    pub async fn resolve_account(&self, code: &str) -> Result<Account, LedgerError> {
        self.store
            .get_account(code)
            .await?
            .ok_or_else(|| LedgerError::UnknownAccount(code.to_string()))
    }

    /// Idempotently resolve or create a counterparty-scoped sub-account
    /// under `base_code`, e.g. one student's receivable under the AR control
    /// account. The sub-account inherits the parent's type.
    #[instrument(skip(self, display_name), fields(base_code = %base_code, entity_id = %entity_id))]
    pub async fn get_or_create_scoped_account(
        &self,
        base_code: &str,
        entity_id: &str,
        display_name: &str,
    ) -> Result<Account, LedgerError> {
        let code = format!("{}-{}", base_code, entity_id);

        if let Some(existing) = self.store.get_account(&code).await? {
            return Ok(existing);
        }

        let parent = self.resolve_account(base_code).await?;

        let input = CreateAccount {
            code: code.clone(),
            name: display_name.to_string(),
            account_type: parent.account_type,
            parent_code: Some(parent.code),
        };

        match self.create_account(input).await {
            Ok(account) => Ok(account),
            // Concurrent caller won the creation race; theirs is as good.
            Err(LedgerError::DuplicateCode(_)) => self.resolve_account(&code).await,
            Err(e) => Err(e),
        }
    }

    pub async fn list_children(&self, code: &str) -> Result<Vec<Account>, LedgerError> {
        self.store.list_children(code).await
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.store.list_accounts().await
    }

    /// Soft-delete: the account stops accepting new lines but keeps its
    /// history for balance computation.
    #[instrument(skip(self))]
    pub async fn deactivate_account(&self, code: &str) -> Result<Account, LedgerError> {
        let account = self.store.set_account_active(code, false).await?;
        info!(code = %code, "Account deactivated");
        Ok(account)
    }

    #[instrument(skip(self))]
    pub async fn reactivate_account(&self, code: &str) -> Result<Account, LedgerError> {
        let account = self.store.set_account_active(code, true).await?;
        info!(code = %code, "Account reactivated");
        Ok(account)
    }

    /// Physically remove an account; rejected unless provably entry-free.
    #[instrument(skip(self))]
    pub async fn remove_account(&self, code: &str) -> Result<(), LedgerError> {
        self.store.delete_account(code).await?;
        info!(code = %code, "Account removed");
        Ok(())
    }

    /// Install the default chart of accounts; accounts that already exist are
    /// left untouched, so this is safe to run on every startup.
    #[instrument(skip(self))]
    pub async fn bootstrap_chart(&self) -> Result<Vec<Account>, LedgerError> {
        let mut installed = Vec::new();
        for &(code, name, account_type, parent_code) in DEFAULT_CHART {
            if self.store.get_account(code).await?.is_some() {
                continue;
            }
            let input = CreateAccount {
                code: code.to_string(),
                name: name.to_string(),
                account_type,
                parent_code: parent_code.map(|p| p.to_string()),
            };
            match self.create_account(input).await {
                Ok(account) => installed.push(account),
                Err(LedgerError::DuplicateCode(_)) => {}
                Err(e) => return Err(e),
            }
        }
        info!(installed = installed.len(), "Chart of accounts bootstrapped");
        Ok(installed)
    }
}
