//! Command registry and routing rules.
//!
//! The registry holds one descriptor per command kind and decides, for each
//! inbound event, which kind (if any) should handle it. Routing is a pure
//! function over the event fields and the caller-loaded live sessions; the
//! dispatcher supplies the store lookups around it.
//!
//! Free-text routing is strictly thread-gated: a message resumes a session
//! only when it replies to that session's own last prompt. Input is never
//! matched by shape ("looks like a date"); an earlier incarnation of this
//! bot did that and consumed unrelated chatter.

use quotabot_types::session::{CommandKind, Session};

/// Slash command that aborts an in-progress flow.
pub const CANCEL_TRIGGER: &str = "annulla";

/// Static routing facts for one command kind.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub kind: CommandKind,
    /// Slash trigger without the leading `/` (e.g. `"quota"`).
    pub trigger: &'static str,
    /// Callback-data namespaces this command's keyboards use.
    pub callback_namespaces: &'static [&'static str],
}

impl CommandDescriptor {
    /// Whether `text` is this command's start trigger: `/quota` or
    /// `/quota@anything`.
    pub fn can_start(&self, text: &str) -> bool {
        matches_trigger(text, self.trigger)
    }

    /// Whether this command's keyboards own the callback payload.
    pub fn owns_callback(&self, data: &str) -> bool {
        let namespace = data.split(':').next().unwrap_or("");
        self.callback_namespaces.contains(&namespace)
    }
}

/// Whether `text` is `/{trigger}` or `/{trigger}@anything`.
pub fn matches_trigger(text: &str, trigger: &str) -> bool {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix('/') else {
        return false;
    };
    if body.chars().any(char::is_whitespace) {
        return false;
    }
    body.split('@').next() == Some(trigger)
}

fn is_cancel(text: &str) -> bool {
    matches_trigger(text, CANCEL_TRIGGER)
}

/// Which command should handle a free-text message, and with which session.
#[derive(Debug)]
pub enum MessageRoute<'s> {
    /// Start trigger matched; any pre-existing session of the same kind is
    /// the command's own business (discard-and-restart by default).
    Start { kind: CommandKind },
    /// Explicit cancellation of the most recent live session.
    Cancel { session: &'s Session },
    /// Thread-gated free-text input for an in-progress flow.
    Resume { session: &'s Session },
}

/// Errors raised while building the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate command kind: {0}")]
    DuplicateKind(CommandKind),

    #[error("duplicate start trigger: /{0}")]
    DuplicateTrigger(&'static str),
}

/// The set of known command kinds, built once at process start and passed
/// by reference -- never ambient state.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    entries: Vec<CommandDescriptor>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. Duplicate kinds or triggers are registration-time
    /// errors, never silent overwrites.
    pub fn register(&mut self, descriptor: CommandDescriptor) -> Result<(), RegistryError> {
        if self.entries.iter().any(|d| d.kind == descriptor.kind) {
            return Err(RegistryError::DuplicateKind(descriptor.kind));
        }
        if self.entries.iter().any(|d| d.trigger == descriptor.trigger) {
            return Err(RegistryError::DuplicateTrigger(descriptor.trigger));
        }
        self.entries.push(descriptor);
        Ok(())
    }

    pub fn get(&self, kind: CommandKind) -> Option<&CommandDescriptor> {
        self.entries.iter().find(|d| d.kind == kind)
    }

    /// The descriptor whose start trigger matches `text`, if any.
    pub fn find_start(&self, text: &str) -> Option<&CommandDescriptor> {
        self.entries.iter().find(|d| d.can_start(text))
    }

    /// Route a free-text message.
    ///
    /// Precedence: start trigger (always wins) > cancel > thread-gated
    /// resume. Anything else is a routing miss -- expected steady-state for
    /// unrelated chatter, not an error.
    pub fn route_message<'s>(
        &self,
        text: &str,
        reply_to: Option<i64>,
        sessions: &'s [Session],
    ) -> Option<MessageRoute<'s>> {
        if let Some(descriptor) = self.find_start(text) {
            return Some(MessageRoute::Start {
                kind: descriptor.kind,
            });
        }

        if is_cancel(text) {
            return sessions
                .iter()
                .max_by_key(|s| s.updated_at)
                .map(|session| MessageRoute::Cancel { session });
        }

        let reply_to = reply_to?;
        sessions
            .iter()
            .find(|s| s.last_message_id == Some(reply_to))
            .map(|session| MessageRoute::Resume { session })
    }

    /// Route a button press. A callback can never start a command: it needs
    /// a live session whose last prompt carries the pressed keyboard and
    /// whose command owns the payload namespace.
    pub fn route_callback<'s>(
        &self,
        data: &str,
        message_id: i64,
        sessions: &'s [Session],
    ) -> Option<&'s Session> {
        sessions.iter().find(|s| {
            s.last_message_id == Some(message_id)
                && self.get(s.kind).is_some_and(|d| d.owns_callback(data))
        })
    }
}
