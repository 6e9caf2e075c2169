//! Session store trait definition.

use quotabot_types::error::StoreError;
use quotabot_types::session::{CommandKind, Session};

/// Durable store for in-progress conversational sessions.
///
/// Sessions are keyed by the `(user_id, chat_id, kind)` identity triple.
/// Expiry is a passive filter: `load`/`list_active` never return rows past
/// `expires_at`, and `sweep_expired` physically removes them.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait SessionStore: Send + Sync {
    /// Atomic whole-row upsert keyed by the identity triple.
    ///
    /// Concurrent saves for the same triple resolve last-writer-wins on the
    /// whole row. There is no field-level merging and no optimistic
    /// versioning; the accepted race is documented in DESIGN.md.
    fn save(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Load the live session for one identity triple, if any.
    fn load(
        &self,
        user_id: i64,
        chat_id: i64,
        kind: CommandKind,
    ) -> impl std::future::Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// All live sessions for a user in a chat, any kind, most recently
    /// updated first.
    fn list_active(
        &self,
        user_id: i64,
        chat_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, StoreError>> + Send;

    /// Delete the session for one identity triple. Returns `true` if a row
    /// existed.
    fn delete(
        &self,
        user_id: i64,
        chat_id: i64,
        kind: CommandKind,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;

    /// Physically remove every expired row. Returns the count removed.
    fn sweep_expired(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;
}
