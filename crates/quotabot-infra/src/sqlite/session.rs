//! SQLite session store implementation.
//!
//! Implements `SessionStore` from `quotabot-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, whole-row upsert on
//! the identity triple.

use chrono::Utc;
use quotabot_core::repository::SessionStore;
use quotabot_types::error::StoreError;
use quotabot_types::session::{CommandKind, Session};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    user_id: i64,
    chat_id: i64,
    command_type: String,
    step: String,
    transaction_data: String,
    message_id: Option<i64>,
    created_at: String,
    updated_at: String,
    expires_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            chat_id: row.try_get("chat_id")?,
            command_type: row.try_get("command_type")?,
            step: row.try_get("step")?,
            transaction_data: row.try_get("transaction_data")?,
            message_id: row.try_get("message_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    fn into_session(self) -> Result<Session, StoreError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::Query(format!("invalid session id: {e}")))?;
        let kind: CommandKind = self
            .command_type
            .parse()
            .map_err(|e: String| StoreError::Query(e))?;
        let data: serde_json::Value = serde_json::from_str(&self.transaction_data)
            .map_err(|e| StoreError::Query(format!("invalid draft payload: {e}")))?;

        Ok(Session {
            id,
            user_id: self.user_id,
            chat_id: self.chat_id,
            kind,
            step: self.step,
            data,
            last_message_id: self.message_id,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            expires_at: parse_datetime(&self.expires_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// SessionStore implementation
// ---------------------------------------------------------------------------

impl SessionStore for SqliteSessionStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let data = serde_json::to_string(&session.data)
            .map_err(|e| StoreError::Query(format!("failed to serialize draft: {e}")))?;

        // Single-statement whole-row upsert on the identity triple: the
        // atomicity SessionStore::save promises.
        sqlx::query(
            r#"INSERT INTO sessions
               (id, user_id, chat_id, command_type, step, transaction_data, message_id, created_at, updated_at, expires_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (user_id, chat_id, command_type) DO UPDATE SET
                   id = excluded.id,
                   step = excluded.step,
                   transaction_data = excluded.transaction_data,
                   message_id = excluded.message_id,
                   created_at = excluded.created_at,
                   updated_at = excluded.updated_at,
                   expires_at = excluded.expires_at"#,
        )
        .bind(session.id.to_string())
        .bind(session.user_id)
        .bind(session.chat_id)
        .bind(session.kind.to_string())
        .bind(&session.step)
        .bind(&data)
        .bind(session.last_message_id)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .bind(format_datetime(&session.expires_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    async fn load(
        &self,
        user_id: i64,
        chat_id: i64,
        kind: CommandKind,
    ) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM sessions WHERE user_id = ? AND chat_id = ? AND command_type = ?",
        )
        .bind(user_id)
        .bind(chat_id)
        .bind(kind.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let now = Utc::now();
        match row {
            Some(row) => {
                let session = SessionRow::from_row(&row)
                    .map_err(|e| StoreError::Query(e.to_string()))?
                    .into_session()?;
                // Expiry is a passive filter: the row stays on disk until
                // the next sweep, but readers never see it.
                Ok((!session.is_expired_at(now)).then_some(session))
            }
            None => Ok(None),
        }
    }

    async fn list_active(&self, user_id: i64, chat_id: i64) -> Result<Vec<Session>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM sessions WHERE user_id = ? AND chat_id = ? ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .bind(chat_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let now = Utc::now();
        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session = SessionRow::from_row(row)
                .map_err(|e| StoreError::Query(e.to_string()))?
                .into_session()?;
            if !session.is_expired_at(now) {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    async fn delete(
        &self,
        user_id: i64,
        chat_id: i64,
        kind: CommandKind,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM sessions WHERE user_id = ? AND chat_id = ? AND command_type = ?",
        )
        .bind(user_id)
        .bind(chat_id)
        .bind(kind.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        // Stored timestamps are fixed-width RFC3339 UTC, so the string
        // comparison is chronological.
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(format_datetime(&Utc::now()))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
