//! Tracked chat message types.
//!
//! Every message a flow sends or receives is logged against its session so
//! the command can bulk-delete the conversation scaffolding on completion,
//! optionally keeping one flagged message (the final summary).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Whether a tracked message was sent by the bot or typed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

impl fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageDirection::Incoming => write!(f, "incoming"),
            MessageDirection::Outgoing => write!(f, "outgoing"),
        }
    }
}

impl FromStr for MessageDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(MessageDirection::Incoming),
            "outgoing" => Ok(MessageDirection::Outgoing),
            other => Err(format!("invalid message direction: '{other}'")),
        }
    }
}

/// One chat message belonging to a session.
///
/// At most one message per session carries `is_last = true`; setting it on
/// one message clears it on all others (enforced by the tracker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedMessage {
    pub session_id: Uuid,
    /// Transport message id.
    pub message_id: i64,
    pub direction: MessageDirection,
    /// Flags the message cleanup should preserve.
    pub is_last: bool,
    pub created_at: DateTime<Utc>,
}

impl TrackedMessage {
    pub fn new(session_id: Uuid, message_id: i64, direction: MessageDirection) -> Self {
        Self {
            session_id,
            message_id,
            direction,
            is_last: false,
            created_at: Utc::now(),
        }
    }
}
