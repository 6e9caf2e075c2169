//! Inbound chat event types.
//!
//! `IncomingEvent` is the unified shape the transport entrypoint decodes
//! webhook payloads into before handing them to the dispatcher. The engine
//! never talks to the chat platform's wire format directly.

use serde::{Deserialize, Serialize};

/// An inbound chat event, decoded by the transport entrypoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IncomingEvent {
    /// Free text typed by a user.
    Message {
        user_id: i64,
        chat_id: i64,
        /// Transport id of the user's own message.
        message_id: i64,
        text: String,
        /// Display handle of the sender, when the platform provides one.
        username: Option<String>,
        /// Transport id of the message this one replies to, if any.
        reply_to_message_id: Option<i64>,
    },
    /// An inline-button press.
    Callback {
        user_id: i64,
        chat_id: i64,
        /// Transport id of the message carrying the pressed keyboard.
        message_id: i64,
        /// Opaque id used to acknowledge the press back to the transport.
        callback_id: String,
        /// Button payload, namespaced by the command that built the keyboard.
        data: String,
        username: Option<String>,
    },
}

impl IncomingEvent {
    pub fn user_id(&self) -> i64 {
        match self {
            IncomingEvent::Message { user_id, .. } => *user_id,
            IncomingEvent::Callback { user_id, .. } => *user_id,
        }
    }

    pub fn chat_id(&self) -> i64 {
        match self {
            IncomingEvent::Message { chat_id, .. } => *chat_id,
            IncomingEvent::Callback { chat_id, .. } => *chat_id,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            IncomingEvent::Message { username, .. } => username.as_deref(),
            IncomingEvent::Callback { username, .. } => username.as_deref(),
        }
    }
}

/// Where an outbound message should be delivered.
///
/// Most traffic goes back to the chat the event came from; completion
/// notifications go to the contact's handle instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Chat(i64),
    Username(String),
}
