//! Conversational session types.
//!
//! A `Session` is the durable record of where a user is inside a multi-step
//! command. It is keyed by the `(user_id, chat_id, kind)` identity triple:
//! a user may run different command kinds concurrently in the same chat,
//! but never two instances of the same kind.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// The closed set of command kinds the engine knows how to run.
///
/// Persisted as a string in the sessions table; an unrecognized value read
/// back from storage is corruption and is reported via `FromStr`, never
/// silently coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Monthly fee registration (`/quota`).
    Quota,
    /// Enrollment fee registration (`/iscrizione`).
    Iscrizione,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Quota => write!(f, "quota"),
            CommandKind::Iscrizione => write!(f, "iscrizione"),
        }
    }
}

impl FromStr for CommandKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quota" => Ok(CommandKind::Quota),
            "iscrizione" => Ok(CommandKind::Iscrizione),
            other => Err(format!("invalid command kind: '{other}'")),
        }
    }
}

/// Durable state of one in-progress conversational flow.
///
/// `step` and `data` are opaque at this layer: the owning command parses
/// them into its own step enum and draft payload immediately after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// UUIDv7 assigned at creation; tracked messages reference it.
    pub id: Uuid,
    pub user_id: i64,
    pub chat_id: i64,
    pub kind: CommandKind,
    /// Command-specific step name (e.g. "family", "amount").
    pub step: String,
    /// Kind-specific draft payload, serialized as JSON.
    pub data: serde_json::Value,
    /// Transport id of the last outgoing prompt, used for thread-gating
    /// and for `edit_last`.
    pub last_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Passive TTL: `load` filters rows past this instant, a periodic
    /// sweep physically removes them.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session at the given step, expiring `ttl` from now.
    pub fn new(
        user_id: i64,
        chat_id: i64,
        kind: CommandKind,
        step: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            chat_id,
            kind,
            step: step.into(),
            data: serde_json::Value::Null,
            last_message_id: None,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
        }
    }

    /// Whether this session is past its expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Refresh `updated_at` and push `expires_at` forward by `ttl`.
    ///
    /// Called after every successfully validated step so an active
    /// conversation never expires out from under the user.
    pub fn touch(&mut self, ttl: Duration) {
        let now = Utc::now();
        self.updated_at = now;
        self.expires_at = now + ttl;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_kind_roundtrip() {
        for kind in [CommandKind::Quota, CommandKind::Iscrizione] {
            let s = kind.to_string();
            let parsed: CommandKind = s.parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_command_kind_rejects_unknown() {
        let err = "tombola".parse::<CommandKind>().unwrap_err();
        assert!(err.contains("tombola"));
    }

    #[test]
    fn test_new_session_is_live() {
        let session = Session::new(1, 2, CommandKind::Quota, "family", Duration::minutes(30));
        assert!(!session.is_expired_at(Utc::now()));
        assert_eq!(session.step, "family");
        assert!(session.last_message_id.is_none());
    }

    #[test]
    fn test_touch_extends_expiry() {
        let mut session = Session::new(1, 2, CommandKind::Quota, "family", Duration::minutes(1));
        let before = session.expires_at;
        session.touch(Duration::minutes(30));
        assert!(session.expires_at > before);
    }

    #[test]
    fn test_expired_session_detected() {
        let mut session = Session::new(1, 2, CommandKind::Quota, "family", Duration::minutes(5));
        session.expires_at = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired_at(Utc::now()));
    }
}
