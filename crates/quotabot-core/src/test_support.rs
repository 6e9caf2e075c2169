//! Hand-rolled collaborator fakes for engine tests.
//!
//! In-memory implementations of the port traits, with switches to force
//! the failure modes the error-handling paths care about.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use quotabot_types::error::{StoreError, SyncError, TransportError};
use quotabot_types::event::Recipient;
use quotabot_types::message::TrackedMessage;
use quotabot_types::session::{CommandKind, Session};
use quotabot_types::transaction::Transaction;

use crate::repository::{MessageTracker, SessionStore, TransactionStore};
use crate::sync::SheetSync;
use crate::transport::ChatTransport;

// ---------------------------------------------------------------------------
// Transport fake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub to: Recipient,
    pub text: String,
    pub has_options: bool,
}

#[derive(Default)]
pub struct FakeTransport {
    next_id: AtomicI64,
    sent: Mutex<Vec<SentMessage>>,
    edits: Mutex<Vec<(i64, String)>>,
    deletes: Mutex<Vec<i64>>,
    answered: Mutex<Vec<String>>,
    reject_edits: AtomicBool,
    fail_deletes: AtomicBool,
    fail_username_sends: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            ..Self::default()
        }
    }

    pub fn reject_edits(&self) {
        self.reject_edits.store(true, Ordering::Relaxed);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::Relaxed);
    }

    pub fn fail_username_sends(&self) {
        self.fail_username_sends.store(true, Ordering::Relaxed);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }

    pub fn edited(&self) -> Vec<(i64, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<i64> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn answered(&self) -> Vec<String> {
        self.answered.lock().unwrap().clone()
    }
}

impl ChatTransport for FakeTransport {
    async fn send(
        &self,
        to: &Recipient,
        text: &str,
        options: Option<&serde_json::Value>,
    ) -> Result<i64, TransportError> {
        if self.fail_username_sends.load(Ordering::Relaxed)
            && matches!(to, Recipient::Username(_))
        {
            return Err(TransportError::Rejected("chat not found".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sent.lock().unwrap().push(SentMessage {
            to: to.clone(),
            text: text.to_string(),
            has_options: options.is_some(),
        });
        Ok(id)
    }

    async fn edit(
        &self,
        _chat_id: i64,
        message_id: i64,
        text: &str,
        _options: Option<&serde_json::Value>,
    ) -> Result<(), TransportError> {
        if self.reject_edits.load(Ordering::Relaxed) {
            return Err(TransportError::Rejected("message too old".to_string()));
        }
        self.edits.lock().unwrap().push((message_id, text.to_string()));
        Ok(())
    }

    async fn delete(&self, _chat_id: i64, message_id: i64) -> Result<(), TransportError> {
        if self.fail_deletes.load(Ordering::Relaxed) {
            return Err(TransportError::Rejected("already deleted".to_string()));
        }
        self.deletes.lock().unwrap().push(message_id);
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        _text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemSessions {
    rows: Mutex<HashMap<(i64, i64, CommandKind), Session>>,
    fail_saves: AtomicBool,
}

impl MemSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::Relaxed);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

impl SessionStore for MemSessions {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(StoreError::Connection);
        }
        self.rows.lock().unwrap().insert(
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
            .lock()
            .unwrap()
            .get(&(user_id, chat_id, kind))
            .filter(|s| !s.is_expired_at(now))
            .cloned())
    }

    async fn list_active(&self, user_id: i64, chat_id: i64) -> Result<Vec<Session>, StoreError> {
        let now = Utc::now();
        let mut sessions: Vec<Session> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id && s.chat_id == chat_id && !s.is_expired_at(now))
            .cloned()
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
        Ok(self
            .rows
            .lock()
            .unwrap()
            .remove(&(user_id, chat_id, kind))
            .is_some())
    }

    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, s| !s.is_expired_at(now));
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemTracker {
    rows: Mutex<Vec<TrackedMessage>>,
}

impl MemTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageTracker for MemTracker {
    async fn track(&self, message: &TrackedMessage) -> Result<(), StoreError> {
        self.rows.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn mark_last(&self, session_id: &Uuid, message_id: i64) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        for row in rows.iter_mut().filter(|r| r.session_id == *session_id) {
            row.is_last = row.message_id == message_id;
        }
        Ok(())
    }

    async fn list(&self, session_id: &Uuid) -> Result<Vec<TrackedMessage>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.session_id == *session_id)
            .cloned()
            .collect())
    }

    async fn delete_non_last(&self, session_id: &Uuid) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.session_id != *session_id || r.is_last);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_all(&self, session_id: &Uuid) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.session_id != *session_id);
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemTransactions {
    rows: Mutex<Vec<Transaction>>,
}

impl MemTransactions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Transaction> {
        self.rows.lock().unwrap().clone()
    }
}

impl TransactionStore for MemTransactions {
    async fn insert(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.rows.lock().unwrap().push(transaction.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Transaction>, StoreError> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Sheet sync fake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetMode {
    Ok,
    NotConfigured,
    Fail,
}

pub struct RecordingSheet {
    mode: Mutex<SheetMode>,
    appended: Mutex<Vec<Uuid>>,
}

impl RecordingSheet {
    pub fn new(mode: SheetMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            appended: Mutex::new(Vec::new()),
        }
    }

    pub fn appended(&self) -> Vec<Uuid> {
        self.appended.lock().unwrap().clone()
    }
}

impl SheetSync for RecordingSheet {
    async fn append(&self, transaction: &Transaction) -> Result<(), SyncError> {
        match *self.mode.lock().unwrap() {
            SheetMode::Ok => {
                self.appended.lock().unwrap().push(transaction.id);
                Ok(())
            }
            SheetMode::NotConfigured => Err(SyncError::NotConfigured),
            SheetMode::Fail => Err(SyncError::Push("quota exceeded".to_string())),
        }
    }
}
