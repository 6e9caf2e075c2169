//! SQLite transaction store implementation.

use quotabot_core::repository::TransactionStore;
use quotabot_types::error::StoreError;
use quotabot_types::transaction::Transaction;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `TransactionStore`.
pub struct SqliteTransactionStore {
    pool: DatabasePool,
}

impl SqliteTransactionStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct TransactionRow {
    id: String,
    family: String,
    category: String,
    amount_cents: i64,
    month: i64,
    year: i64,
    contact: String,
    registered_by: i64,
    registered_by_username: Option<String>,
    created_at: String,
}

impl TransactionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            family: row.try_get("family")?,
            category: row.try_get("category")?,
            amount_cents: row.try_get("amount_cents")?,
            month: row.try_get("month")?,
            year: row.try_get("year")?,
            contact: row.try_get("contact")?,
            registered_by: row.try_get("registered_by")?,
            registered_by_username: row.try_get("registered_by_username")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_transaction(self) -> Result<Transaction, StoreError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::Query(format!("invalid transaction id: {e}")))?;
        let month = u8::try_from(self.month)
            .map_err(|_| StoreError::Query(format!("month out of range: {}", self.month)))?;
        let year = u16::try_from(self.year)
            .map_err(|_| StoreError::Query(format!("year out of range: {}", self.year)))?;

        Ok(Transaction {
            id,
            family: self.family,
            category: self.category,
            amount_cents: self.amount_cents,
            month,
            year,
            contact: self.contact,
            registered_by: self.registered_by,
            registered_by_username: self.registered_by_username,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// TransactionStore implementation
// ---------------------------------------------------------------------------

impl TransactionStore for SqliteTransactionStore {
    async fn insert(&self, transaction: &Transaction) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO transactions
               (id, family, category, amount_cents, month, year, contact, registered_by, registered_by_username, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(transaction.id.to_string())
        .bind(&transaction.family)
        .bind(&transaction.category)
        .bind(transaction.amount_cents)
        .bind(i64::from(transaction.month))
        .bind(i64::from(transaction.year))
        .bind(&transaction.contact)
        .bind(transaction.registered_by)
        .bind(&transaction.registered_by_username)
        .bind(format_datetime(&transaction.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query("SELECT * FROM transactions ORDER BY created_at DESC LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in &rows {
            transactions.push(
                TransactionRow::from_row(row)
                    .map_err(|e| StoreError::Query(e.to_string()))?
                    .into_transaction()?,
            );
        }
        Ok(transactions)
    }
}
