//! Message tracker trait definition.

use quotabot_types::error::StoreError;
use quotabot_types::message::TrackedMessage;
use uuid::Uuid;

/// Durable log of the chat messages belonging to a session.
///
/// The tracker only records rows; deleting the actual chat messages is the
/// flow's job (see `command::flow::Flow::cleanup_messages`).
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait MessageTracker: Send + Sync {
    /// Record one message for a session.
    fn track(
        &self,
        message: &TrackedMessage,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Flag one message as the session's "message to keep", clearing the
    /// flag on every other message of that session first. At most one
    /// tracked message per session carries the flag.
    fn mark_last(
        &self,
        session_id: &Uuid,
        message_id: i64,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// All tracked messages for a session, in insertion order.
    fn list(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<TrackedMessage>, StoreError>> + Send;

    /// Remove every tracked row for a session except the flagged one.
    /// Returns the count removed.
    fn delete_non_last(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;

    /// Remove every tracked row for a session. Returns the count removed.
    fn delete_all(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;
}
