//! PostgreSQL ledger store.
//!
//! Pool lifecycle is explicit: callers build a [`PgStore`] from
//! [`DatabaseConfig`] and pass the handle in. Idempotency and uniqueness are
//! enforced by the schema (a partial unique index on non-void
//! `(source, reference)`), so a duplicate post is a rejected write.

use crate::config::DatabaseConfig;
use crate::error::LedgerError;
use crate::models::{
    Account, AccountType, EntryFilter, EntryLine, EntrySource, EntryStatus, SourceRef,
    TransactionEntry,
};
use crate::services::metrics::STORE_OP_DURATION;
use crate::store::{AccountTotals, DatedLine, LedgerStore};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct TxRow {
    transaction_id: String,
    entry_date: NaiveDate,
    total_debit: Decimal,
    total_credit: Decimal,
    source: EntrySource,
    source_id: Option<String>,
    source_model: Option<String>,
    reference: Option<String>,
    status: EntryStatus,
    metadata: Option<serde_json::Value>,
    posted_utc: DateTime<Utc>,
}

impl TxRow {
    fn into_entry(self, lines: Vec<EntryLine>) -> TransactionEntry {
        let source_ref = match (self.source_id, self.source_model) {
            (Some(id), Some(model)) => Some(SourceRef { id, model }),
            _ => None,
        };
        TransactionEntry {
            transaction_id: self.transaction_id,
            date: self.entry_date,
            lines,
            total_debit: self.total_debit,
            total_credit: self.total_credit,
            source: self.source,
            source_ref,
            reference: self.reference,
            status: self.status,
            metadata: self.metadata,
            posted_utc: self.posted_utc,
        }
    }
}

#[derive(Debug, FromRow)]
struct LineRow {
    account_code: String,
    account_name: String,
    account_type: AccountType,
    debit: Decimal,
    credit: Decimal,
    description: String,
}

const TX_COLUMNS: &str = "transaction_id, entry_date, total_debit, total_credit, source, \
                          source_id, source_model, reference, status, metadata, posted_utc";

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, LedgerError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(&config.url)
            .await
            .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn load_lines(&self, transaction_id: &str) -> Result<Vec<EntryLine>, LedgerError> {
        let rows = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT account_code, account_name, account_type, debit, credit, description
            FROM ledger_lines
            WHERE transaction_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to load lines: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|r| EntryLine {
                account_code: r.account_code,
                account_name: r.account_name,
                account_type: r.account_type,
                debit: r.debit,
                credit: r.credit,
                description: r.description,
            })
            .collect())
    }

    async fn hydrate(&self, rows: Vec<TxRow>) -> Result<Vec<TransactionEntry>, LedgerError> {
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = self.load_lines(&row.transaction_id).await?;
            entries.push(row.into_entry(lines));
        }
        Ok(entries)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    #[instrument(skip(self, account), fields(code = %account.code))]
    async fn insert_account(&self, account: Account) -> Result<Account, LedgerError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["insert_account"])
            .start_timer();

        let inserted = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (code, name, account_type, parent_code, is_active, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING code, name, account_type, parent_code, is_active, created_utc
            "#,
        )
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type)
        .bind(&account.parent_code)
        .bind(account.is_active)
        .bind(account.created_utc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                LedgerError::DuplicateCode(account.code.clone())
            }
            _ => LedgerError::Storage(anyhow::anyhow!("Failed to create account: {}", e)),
        })?;

        timer.observe_duration();

        Ok(inserted)
    }

    async fn get_account(&self, code: &str) -> Result<Option<Account>, LedgerError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["get_account"])
            .start_timer();

        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT code, name, account_type, parent_code, is_active, created_utc
            FROM accounts
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to get account: {}", e)))?;

        timer.observe_duration();

        Ok(account)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT code, name, account_type, parent_code, is_active, created_utc
            FROM accounts
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to list accounts: {}", e)))
    }

    async fn list_children(&self, parent_code: &str) -> Result<Vec<Account>, LedgerError> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT code, name, account_type, parent_code, is_active, created_utc
            FROM accounts
            WHERE parent_code = $1
            ORDER BY code
            "#,
        )
        .bind(parent_code)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to list children: {}", e)))
    }

    #[instrument(skip(self))]
    async fn set_account_active(&self, code: &str, active: bool) -> Result<Account, LedgerError> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET is_active = $2
            WHERE code = $1
            RETURNING code, name, account_type, parent_code, is_active, created_utc
            "#,
        )
        .bind(code)
        .bind(active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to update account: {}", e)))?
        .ok_or_else(|| LedgerError::UnknownAccount(code.to_string()))
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, code: &str) -> Result<(), LedgerError> {
        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM ledger_lines WHERE account_code = $1)",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to check entries: {}", e)))?;

        if referenced {
            return Err(LedgerError::AccountNotEmpty(code.to_string()));
        }

        let result = sqlx::query("DELETE FROM accounts WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                // Lines or child accounts appended since the check above.
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    LedgerError::AccountNotEmpty(code.to_string())
                }
                _ => LedgerError::Storage(anyhow::anyhow!("Failed to delete account: {}", e)),
            })?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::UnknownAccount(code.to_string()));
        }
        Ok(())
    }

    async fn account_has_entries(&self, code: &str) -> Result<bool, LedgerError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ledger_lines WHERE account_code = $1)")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to check entries: {}", e)))
    }

    /// Append one entry: the transaction row and all of its lines commit in a
    /// single database transaction.
    #[instrument(skip(self, entry), fields(transaction_id = %entry.transaction_id, source = %entry.source))]
    async fn insert_entry(
        &self,
        entry: TransactionEntry,
    ) -> Result<TransactionEntry, LedgerError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["insert_entry"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to begin transaction: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO ledger_transactions
                (transaction_id, entry_date, total_debit, total_credit, source,
                 source_id, source_model, reference, status, metadata, posted_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&entry.transaction_id)
        .bind(entry.date)
        .bind(entry.total_debit)
        .bind(entry.total_credit)
        .bind(entry.source)
        .bind(entry.source_ref.as_ref().map(|r| r.id.clone()))
        .bind(entry.source_ref.as_ref().map(|r| r.model.clone()))
        .bind(&entry.reference)
        .bind(entry.status)
        .bind(&entry.metadata)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.is_unique_violation()
                    && db_err.constraint() == Some("uq_ledger_transactions_source_reference") =>
            {
                LedgerError::DuplicateReference {
                    origin: entry.source.to_string(),
                    reference: entry.reference.clone().unwrap_or_default(),
                }
            }
            _ => LedgerError::Storage(anyhow::anyhow!("Failed to insert entry: {}", e)),
        })?;

        for (line_no, line) in entry.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO ledger_lines
                    (line_id, transaction_id, line_no, account_code, account_name,
                     account_type, debit, credit, description)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&entry.transaction_id)
            .bind(line_no as i32)
            .bind(&line.account_code)
            .bind(&line.account_name)
            .bind(line.account_type)
            .bind(line.debit)
            .bind(line.credit)
            .bind(&line.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to insert line: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to commit entry: {}", e)))?;

        timer.observe_duration();

        Ok(entry)
    }

    async fn get_entry(
        &self,
        transaction_id: &str,
    ) -> Result<Option<TransactionEntry>, LedgerError> {
        let row = sqlx::query_as::<_, TxRow>(&format!(
            "SELECT {TX_COLUMNS} FROM ledger_transactions WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to get entry: {}", e)))?;

        match row {
            Some(row) => {
                let lines = self.load_lines(transaction_id).await?;
                Ok(Some(row.into_entry(lines)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn set_entry_status(
        &self,
        transaction_id: &str,
        status: EntryStatus,
    ) -> Result<TransactionEntry, LedgerError> {
        let current = self.get_entry(transaction_id).await?.ok_or_else(|| {
            LedgerError::NotFound(anyhow::anyhow!("transaction {} not found", transaction_id))
        })?;

        let row = sqlx::query_as::<_, TxRow>(&format!(
            "UPDATE ledger_transactions SET status = $2 WHERE transaction_id = $1 \
             RETURNING {TX_COLUMNS}"
        ))
        .bind(transaction_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            // Re-posting a voided entry can re-enter the partial unique index.
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                LedgerError::DuplicateReference {
                    origin: current.source.to_string(),
                    reference: current.reference.clone().unwrap_or_default(),
                }
            }
            _ => LedgerError::Storage(anyhow::anyhow!("Failed to update status: {}", e)),
        })?;

        let lines = self.load_lines(transaction_id).await?;
        Ok(row.into_entry(lines))
    }

    async fn find_by_reference(
        &self,
        source: EntrySource,
        reference: &str,
    ) -> Result<Option<TransactionEntry>, LedgerError> {
        let row = sqlx::query_as::<_, TxRow>(&format!(
            "SELECT {TX_COLUMNS} FROM ledger_transactions \
             WHERE source = $1 AND reference = $2 AND status <> 'void' \
             LIMIT 1"
        ))
        .bind(source)
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to find by reference: {}", e)))?;

        match row {
            Some(row) => {
                let lines = self.load_lines(&row.transaction_id).await?;
                Ok(Some(row.into_entry(lines)))
            }
            None => Ok(None),
        }
    }

    async fn find_by_source(
        &self,
        source: EntrySource,
        source_id: &str,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        let rows = sqlx::query_as::<_, TxRow>(&format!(
            "SELECT {TX_COLUMNS} FROM ledger_transactions \
             WHERE source = $1 AND source_id = $2 \
             ORDER BY posted_utc"
        ))
        .bind(source)
        .bind(source_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to find by source: {}", e)))?;

        self.hydrate(rows).await
    }

    async fn list_entries(
        &self,
        filter: EntryFilter,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        let rows = sqlx::query_as::<_, TxRow>(&format!(
            "SELECT {TX_COLUMNS} FROM ledger_transactions \
             WHERE ($1::varchar IS NULL OR source = $1) \
               AND ($2::date IS NULL OR entry_date >= $2) \
               AND ($3::date IS NULL OR entry_date <= $3) \
               AND ($4::bool OR status <> 'void') \
             ORDER BY entry_date, posted_utc"
        ))
        .bind(filter.source)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.include_void)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to list entries: {}", e)))?;

        self.hydrate(rows).await
    }

    async fn account_totals(
        &self,
        code: &str,
        start: Option<NaiveDate>,
        as_of: Option<NaiveDate>,
    ) -> Result<(Decimal, Decimal), LedgerError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["account_totals"])
            .start_timer();

        let totals: (Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(l.debit), 0), COALESCE(SUM(l.credit), 0)
            FROM ledger_lines l
            JOIN ledger_transactions t ON t.transaction_id = l.transaction_id
            WHERE l.account_code = $1
              AND t.status = 'posted'
              AND ($2::date IS NULL OR t.entry_date >= $2)
              AND ($3::date IS NULL OR t.entry_date <= $3)
            "#,
        )
        .bind(code)
        .bind(start)
        .bind(as_of)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to get totals: {}", e)))?;

        timer.observe_duration();

        Ok(totals)
    }

    async fn posted_totals(
        &self,
        start: Option<NaiveDate>,
        as_of: Option<NaiveDate>,
    ) -> Result<Vec<AccountTotals>, LedgerError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["posted_totals"])
            .start_timer();

        let totals = sqlx::query_as::<_, AccountTotals>(
            r#"
            SELECT l.account_code,
                   COALESCE(SUM(l.debit), 0) AS debit,
                   COALESCE(SUM(l.credit), 0) AS credit
            FROM ledger_lines l
            JOIN ledger_transactions t ON t.transaction_id = l.transaction_id
            WHERE t.status = 'posted'
              AND ($1::date IS NULL OR t.entry_date >= $1)
              AND ($2::date IS NULL OR t.entry_date <= $2)
            GROUP BY l.account_code
            ORDER BY l.account_code
            "#,
        )
        .bind(start)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to get posted totals: {}", e)))?;

        timer.observe_duration();

        Ok(totals)
    }

    async fn account_lines(
        &self,
        code: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<Vec<DatedLine>, LedgerError> {
        sqlx::query_as::<_, DatedLine>(
            r#"
            SELECT t.entry_date AS date, l.debit, l.credit
            FROM ledger_lines l
            JOIN ledger_transactions t ON t.transaction_id = l.transaction_id
            WHERE l.account_code = $1
              AND t.status = 'posted'
              AND ($2::date IS NULL OR t.entry_date <= $2)
            ORDER BY t.entry_date
            "#,
        )
        .bind(code)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(anyhow::anyhow!("Failed to get account lines: {}", e)))
    }
}
