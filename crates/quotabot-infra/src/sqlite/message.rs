//! SQLite message tracker implementation.
//!
//! Implements `MessageTracker` from `quotabot-core` using sqlx with split
//! read/write pools. Rows have no foreign key to sessions: the flagged
//! summary row survives its session's deletion.

use quotabot_core::repository::MessageTracker;
use quotabot_types::error::StoreError;
use quotabot_types::message::{MessageDirection, TrackedMessage};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `MessageTracker`.
pub struct SqliteMessageTracker {
    pool: DatabasePool,
}

impl SqliteMessageTracker {
    /// Create a new tracker backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct TrackedMessageRow {
    session_id: String,
    message_id: i64,
    message_type: String,
    is_last: bool,
    created_at: String,
}

impl TrackedMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            message_id: row.try_get("message_id")?,
            message_type: row.try_get("message_type")?,
            is_last: row.try_get("is_last")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<TrackedMessage, StoreError> {
        let session_id = Uuid::parse_str(&self.session_id)
            .map_err(|e| StoreError::Query(format!("invalid session id: {e}")))?;
        let direction: MessageDirection = self
            .message_type
            .parse()
            .map_err(|e: String| StoreError::Query(e))?;

        Ok(TrackedMessage {
            session_id,
            message_id: self.message_id,
            direction,
            is_last: self.is_last,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// MessageTracker implementation
// ---------------------------------------------------------------------------

impl MessageTracker for SqliteMessageTracker {
    async fn track(&self, message: &TrackedMessage) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO tracked_messages (session_id, message_id, message_type, is_last, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(message.session_id.to_string())
        .bind(message.message_id)
        .bind(message.direction.to_string())
        .bind(message.is_last)
        .bind(format_datetime(&message.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    async fn mark_last(&self, session_id: &Uuid, message_id: i64) -> Result<(), StoreError> {
        // Clear-then-set in one transaction so the at-most-one-flag
        // invariant holds under concurrent writers.
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        sqlx::query("UPDATE tracked_messages SET is_last = 0 WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        sqlx::query(
            "UPDATE tracked_messages SET is_last = 1 WHERE session_id = ? AND message_id = ?",
        )
        .bind(session_id.to_string())
        .bind(message_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self, session_id: &Uuid) -> Result<Vec<TrackedMessage>, StoreError> {
        let rows = sqlx::query("SELECT * FROM tracked_messages WHERE session_id = ? ORDER BY id")
            .bind(session_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            messages.push(
                TrackedMessageRow::from_row(row)
                    .map_err(|e| StoreError::Query(e.to_string()))?
                    .into_message()?,
            );
        }
        Ok(messages)
    }

    async fn delete_non_last(&self, session_id: &Uuid) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM tracked_messages WHERE session_id = ? AND is_last = 0")
                .bind(session_id.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn delete_all(&self, session_id: &Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tracked_messages WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
