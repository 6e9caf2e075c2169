//! Chat transport trait definition.
//!
//! The concrete client (Telegram or otherwise) lives outside this
//! repository; the engine only sees this surface. The `options` bag is
//! opaque: keyboards and formatting flags are built by the presentation
//! layer and forwarded verbatim.

use quotabot_types::error::TransportError;
use quotabot_types::event::Recipient;

/// Outbound side of the chat platform.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ChatTransport: Send + Sync {
    /// Send a message. Returns the transport's id for the new message.
    fn send(
        &self,
        to: &Recipient,
        text: &str,
        options: Option<&serde_json::Value>,
    ) -> impl std::future::Future<Output = Result<i64, TransportError>> + Send;

    /// Edit an existing message in place. The transport may reject this
    /// (message too old, already deleted, unchanged content).
    fn edit(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        options: Option<&serde_json::Value>,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Delete a message. Callers treat failures as best-effort.
    fn delete(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Acknowledge an inline-button press so the client stops its spinner.
    fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}
