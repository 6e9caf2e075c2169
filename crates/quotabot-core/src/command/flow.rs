//! Session and message lifecycle helpers shared by every command.
//!
//! `Flow` bundles the transport, the session store, and the message
//! tracker for one `(user, chat)` scope: tracked sends, edit-with-fallback,
//! best-effort deletes, and the bulk cleanup that removes a finished
//! conversation's scaffolding from the chat.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use quotabot_types::error::{EngineError, StoreError, TransportError};
use quotabot_types::event::Recipient;
use quotabot_types::message::{MessageDirection, TrackedMessage};
use quotabot_types::session::Session;

use crate::repository::{MessageTracker, SessionStore};
use crate::step::Prompt;
use crate::transport::ChatTransport;

/// What a cleanup pass did. Transport failures are counted, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub preserved: usize,
    pub failed: usize,
}

/// Lifecycle glue for one command invocation.
pub struct Flow<'a, T, S, M> {
    transport: &'a T,
    sessions: &'a S,
    messages: &'a M,
    chat_id: i64,
    cleanup_concurrency: usize,
}

impl<'a, T, S, M> Flow<'a, T, S, M>
where
    T: ChatTransport,
    S: SessionStore,
    M: MessageTracker,
{
    pub fn new(
        transport: &'a T,
        sessions: &'a S,
        messages: &'a M,
        chat_id: i64,
        cleanup_concurrency: usize,
    ) -> Self {
        Self {
            transport,
            sessions,
            messages,
            chat_id,
            cleanup_concurrency: cleanup_concurrency.max(1),
        }
    }

    // --- Session helpers ---

    pub async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions.save(session).await
    }

    pub async fn delete_session(&self, session: &Session) -> Result<bool, StoreError> {
        self.sessions
            .delete(session.user_id, session.chat_id, session.kind)
            .await
    }

    // --- Messaging helpers ---

    /// Send a prompt, track it as outgoing, and flag it as the session's
    /// last prompt (the thread-gate target for the user's next reply).
    pub async fn send_prompt(
        &self,
        session: &mut Session,
        prompt: &Prompt,
    ) -> Result<i64, EngineError> {
        let message_id = self
            .transport
            .send(
                &Recipient::Chat(self.chat_id),
                &prompt.text,
                prompt.options.as_ref(),
            )
            .await?;
        self.messages
            .track(&TrackedMessage::new(
                session.id,
                message_id,
                MessageDirection::Outgoing,
            ))
            .await?;
        self.messages.mark_last(&session.id, message_id).await?;
        session.last_message_id = Some(message_id);
        Ok(message_id)
    }

    /// Edit the session's last prompt in place, degrading to a fresh send
    /// when the id is missing or the transport rejects the edit.
    pub async fn edit_last(
        &self,
        session: &mut Session,
        prompt: &Prompt,
    ) -> Result<(), EngineError> {
        let Some(message_id) = session.last_message_id else {
            self.send_prompt(session, prompt).await?;
            return Ok(());
        };
        match self
            .transport
            .edit(self.chat_id, message_id, &prompt.text, prompt.options.as_ref())
            .await
        {
            Ok(()) => Ok(()),
            Err(TransportError::Rejected(reason)) => {
                debug!(message_id, reason, "edit rejected, sending a fresh prompt");
                self.send_prompt(session, prompt).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Best-effort delete of the session's last prompt. Never raises.
    pub async fn delete_last(&self, session: &Session) {
        if let Some(message_id) = session.last_message_id {
            if let Err(err) = self.transport.delete(self.chat_id, message_id).await {
                debug!(message_id, error = %err, "best-effort delete failed");
            }
        }
    }

    /// Record the user's own input message against the session.
    pub async fn track_incoming(
        &self,
        session: &Session,
        message_id: i64,
    ) -> Result<(), StoreError> {
        self.messages
            .track(&TrackedMessage::new(
                session.id,
                message_id,
                MessageDirection::Incoming,
            ))
            .await
    }

    /// Delete the session's tracked messages from the chat, keeping the
    /// flagged one when `preserve_last` is set.
    ///
    /// Transport deletes run as a bounded concurrent batch purely for
    /// latency; a message the chat has already removed (or refuses to
    /// remove) is counted as failed, never fatal. Tracker rows for the
    /// deleted messages are consumed either way.
    pub async fn cleanup_messages(
        &self,
        session: &Session,
        preserve_last: bool,
    ) -> Result<CleanupReport, StoreError> {
        let tracked = self.messages.list(&session.id).await?;
        let (kept, doomed): (Vec<_>, Vec<_>) = tracked
            .into_iter()
            .partition(|m| preserve_last && m.is_last);

        let deleted = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        stream::iter(doomed)
            .map(|message| {
                let deleted = &deleted;
                let failed = &failed;
                async move {
                    match self.transport.delete(self.chat_id, message.message_id).await {
                        Ok(()) => {
                            deleted.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            warn!(
                                message_id = message.message_id,
                                error = %err,
                                "cleanup could not delete message"
                            );
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
            .buffer_unordered(self.cleanup_concurrency)
            .collect::<Vec<()>>()
            .await;

        if preserve_last {
            self.messages.delete_non_last(&session.id).await?;
        } else {
            self.messages.delete_all(&session.id).await?;
        }

        Ok(CleanupReport {
            deleted: deleted.load(Ordering::Relaxed),
            preserved: kept.len(),
            failed: failed.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeTransport, MemSessions, MemTracker};
    use chrono::Duration;
    use quotabot_types::session::CommandKind;

    fn session() -> Session {
        Session::new(1, 2, CommandKind::Quota, "family", Duration::minutes(30))
    }

    fn flow<'a>(
        transport: &'a FakeTransport,
        sessions: &'a MemSessions,
        messages: &'a MemTracker,
    ) -> Flow<'a, FakeTransport, MemSessions, MemTracker> {
        Flow::new(transport, sessions, messages, 2, 4)
    }

    #[tokio::test]
    async fn test_send_prompt_tracks_and_marks_last() {
        let transport = FakeTransport::new();
        let sessions = MemSessions::new();
        let messages = MemTracker::new();
        let flow = flow(&transport, &sessions, &messages);

        let mut session = session();
        let first = flow
            .send_prompt(&mut session, &Prompt::text("uno"))
            .await
            .unwrap();
        let second = flow
            .send_prompt(&mut session, &Prompt::text("due"))
            .await
            .unwrap();

        assert_eq!(session.last_message_id, Some(second));
        let tracked = messages.list(&session.id).await.unwrap();
        assert_eq!(tracked.len(), 2);
        let last: Vec<_> = tracked.iter().filter(|m| m.is_last).collect();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].message_id, second);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_edit_last_falls_back_to_send_on_rejection() {
        let transport = FakeTransport::new();
        let sessions = MemSessions::new();
        let messages = MemTracker::new();
        let flow = flow(&transport, &sessions, &messages);

        let mut session = session();
        flow.send_prompt(&mut session, &Prompt::text("uno"))
            .await
            .unwrap();
        let old_id = session.last_message_id.unwrap();

        transport.reject_edits();
        flow.edit_last(&mut session, &Prompt::text("due"))
            .await
            .unwrap();

        assert_ne!(session.last_message_id, Some(old_id));
        assert_eq!(transport.sent_texts().len(), 2);
    }

    #[tokio::test]
    async fn test_edit_last_without_id_sends() {
        let transport = FakeTransport::new();
        let sessions = MemSessions::new();
        let messages = MemTracker::new();
        let flow = flow(&transport, &sessions, &messages);

        let mut session = session();
        flow.edit_last(&mut session, &Prompt::text("uno"))
            .await
            .unwrap();
        assert!(session.last_message_id.is_some());
        assert!(transport.edited().is_empty());
    }

    #[tokio::test]
    async fn test_delete_last_swallows_transport_failure() {
        let transport = FakeTransport::new();
        let sessions = MemSessions::new();
        let messages = MemTracker::new();
        let flow = flow(&transport, &sessions, &messages);

        let mut session = session();
        flow.send_prompt(&mut session, &Prompt::text("uno"))
            .await
            .unwrap();
        transport.fail_deletes();
        // Must not panic or error.
        flow.delete_last(&session).await;
    }

    #[tokio::test]
    async fn test_cleanup_preserves_flagged_message() {
        let transport = FakeTransport::new();
        let sessions = MemSessions::new();
        let messages = MemTracker::new();
        let flow = flow(&transport, &sessions, &messages);

        let mut session = session();
        flow.send_prompt(&mut session, &Prompt::text("uno")).await.unwrap();
        flow.track_incoming(&session, 100).await.unwrap();
        let summary = flow
            .send_prompt(&mut session, &Prompt::text("riepilogo"))
            .await
            .unwrap();

        let report = flow.cleanup_messages(&session, true).await.unwrap();
        assert_eq!(report.preserved, 1);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.failed, 0);
        assert!(!transport.deleted().contains(&summary));

        // Exactly the flagged row survives in the tracker.
        let remaining = messages.list(&session.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message_id, summary);
        assert!(remaining[0].is_last);
    }

    #[tokio::test]
    async fn test_cleanup_counts_transport_failures() {
        let transport = FakeTransport::new();
        let sessions = MemSessions::new();
        let messages = MemTracker::new();
        let flow = flow(&transport, &sessions, &messages);

        let mut session = session();
        flow.send_prompt(&mut session, &Prompt::text("uno")).await.unwrap();
        flow.send_prompt(&mut session, &Prompt::text("due")).await.unwrap();

        transport.fail_deletes();
        let report = flow.cleanup_messages(&session, false).await.unwrap();
        assert_eq!(report.deleted, 0);
        assert_eq!(report.failed, 2);
        // Rows are consumed even when the chat-side delete failed.
        assert!(messages.list(&session.id).await.unwrap().is_empty());
    }
}
