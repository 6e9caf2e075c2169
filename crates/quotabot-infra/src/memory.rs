//! DashMap-backed in-memory store implementations.
//!
//! Same contracts as the SQLite stores, no durability. Useful for tests
//! and for ephemeral single-process runs where a database file is not
//! worth the setup.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use quotabot_core::repository::{MessageTracker, SessionStore, TransactionStore};
use quotabot_types::error::StoreError;
use quotabot_types::message::TrackedMessage;
use quotabot_types::session::{CommandKind, Session};
use quotabot_types::transaction::Transaction;

/// In-memory `SessionStore`, keyed by the identity triple.
#[derive(Default)]
pub struct InMemorySessionStore {
    rows: DashMap<(i64, i64, CommandKind), Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        // DashMap insert replaces the whole value: last-writer-wins, same
        // as the SQLite upsert.
        self.rows.insert(
            (session.user_id, session.chat_id, session.kind),
            session.clone(),
        );
        Ok(())
    }

    async fn load(
        &self,
        user_id: i64,
        chat_id: i64,
        kind: CommandKind,
    ) -> Result<Option<Session>, StoreError> {
        let now = Utc::now();
        Ok(self
            .rows
            .get(&(user_id, chat_id, kind))
            .filter(|entry| !entry.value().is_expired_at(now))
            .map(|entry| entry.value().clone()))
    }

    async fn list_active(&self, user_id: i64, chat_id: i64) -> Result<Vec<Session>, StoreError> {
        let now = Utc::now();
        let mut sessions: Vec<Session> = self
            .rows
            .iter()
            .filter(|entry| {
                let s = entry.value();
                s.user_id == user_id && s.chat_id == chat_id && !s.is_expired_at(now)
            })
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn delete(
        &self,
        user_id: i64,
        chat_id: i64,
        kind: CommandKind,
    ) -> Result<bool, StoreError> {
        Ok(self.rows.remove(&(user_id, chat_id, kind)).is_some())
    }

    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let before = self.rows.len();
        self.rows.retain(|_, s| !s.is_expired_at(now));
        Ok((before - self.rows.len()) as u64)
    }
}

/// In-memory `MessageTracker`, one message list per session.
#[derive(Default)]
pub struct InMemoryMessageTracker {
    rows: DashMap<Uuid, Vec<TrackedMessage>>,
}

impl InMemoryMessageTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageTracker for InMemoryMessageTracker {
    async fn track(&self, message: &TrackedMessage) -> Result<(), StoreError> {
        self.rows
            .entry(message.session_id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn mark_last(&self, session_id: &Uuid, message_id: i64) -> Result<(), StoreError> {
        if let Some(mut messages) = self.rows.get_mut(session_id) {
            for message in messages.iter_mut() {
                message.is_last = message.message_id == message_id;
            }
        }
        Ok(())
    }

    async fn list(&self, session_id: &Uuid) -> Result<Vec<TrackedMessage>, StoreError> {
        Ok(self
            .rows
            .get(session_id)
            .map(|messages| messages.value().clone())
            .unwrap_or_default())
    }

    async fn delete_non_last(&self, session_id: &Uuid) -> Result<u64, StoreError> {
        match self.rows.get_mut(session_id) {
            Some(mut messages) => {
                let before = messages.len();
                messages.retain(|m| m.is_last);
                Ok((before - messages.len()) as u64)
            }
            None => Ok(0),
        }
    }

    async fn delete_all(&self, session_id: &Uuid) -> Result<u64, StoreError> {
        Ok(self
            .rows
            .remove(session_id)
            .map(|(_, messages)| messages.len() as u64)
            .unwrap_or(0))
    }
}

/// In-memory `TransactionStore`.
#[derive(Default)]
pub struct InMemoryTransactionStore {
    rows: DashMap<Uuid, Transaction>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, transaction: &Transaction) -> Result<(), StoreError> {
        if self.rows.contains_key(&transaction.id) {
            return Err(StoreError::Conflict(format!(
                "transaction {} already exists",
                transaction.id
            )));
        }
        self.rows.insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Transaction>, StoreError> {
        let mut transactions: Vec<Transaction> =
            self.rows.iter().map(|entry| entry.value().clone()).collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        transactions.truncate(limit as usize);
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quotabot_types::message::MessageDirection;

    fn session(kind: CommandKind) -> Session {
        Session::new(1, 2, kind, "family", Duration::minutes(30))
    }

    #[tokio::test]
    async fn test_session_store_upserts_on_triple() {
        let store = InMemorySessionStore::new();
        let mut s = session(CommandKind::Quota);
        store.save(&s).await.unwrap();
        s.step = "amount".to_string();
        store.save(&s).await.unwrap();

        let sessions = store.list_active(1, 2).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].step, "amount");
    }

    #[tokio::test]
    async fn test_session_store_filters_expired() {
        let store = InMemorySessionStore::new();
        let mut s = session(CommandKind::Quota);
        s.expires_at = Utc::now() - Duration::seconds(1);
        store.save(&s).await.unwrap();

        assert!(store.load(1, 2, CommandKind::Quota).await.unwrap().is_none());
        assert_eq!(store.sweep_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tracker_flag_uniqueness_and_cleanup() {
        let tracker = InMemoryMessageTracker::new();
        let session_id = Uuid::now_v7();
        for id in [10, 11, 12] {
            tracker
                .track(&TrackedMessage::new(session_id, id, MessageDirection::Outgoing))
                .await
                .unwrap();
        }
        tracker.mark_last(&session_id, 11).await.unwrap();
        tracker.mark_last(&session_id, 12).await.unwrap();

        let flagged: Vec<_> = tracker
            .list(&session_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.is_last)
            .collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].message_id, 12);

        assert_eq!(tracker.delete_non_last(&session_id).await.unwrap(), 2);
        assert_eq!(tracker.delete_all(&session_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transaction_store_rejects_duplicates() {
        let store = InMemoryTransactionStore::new();
        let record = Transaction {
            id: Uuid::now_v7(),
            family: "Rossi".to_string(),
            category: "Quota Mensile".to_string(),
            amount_cents: 2550,
            month: 8,
            year: 2026,
            contact: "@carla".to_string(),
            registered_by: 7,
            registered_by_username: None,
            created_at: Utc::now(),
        };
        store.insert(&record).await.unwrap();
        assert!(matches!(
            store.insert(&record).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.list_recent(10).await.unwrap().len(), 1);
    }
}
