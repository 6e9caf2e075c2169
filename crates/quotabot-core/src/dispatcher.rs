//! Event dispatcher: the engine's single entry point.
//!
//! The dispatcher owns the collaborator bundle, the command registry
//! (built once at startup and reachable only through this object), the
//! auth gate, and the engine configuration. The transport entrypoint
//! decodes each webhook payload into an `IncomingEvent` and hands it to
//! `handle_event`; everything after that is this module's business.

use chrono::Duration;
use tracing::{debug, warn};

use quotabot_types::config::BotConfig;
use quotabot_types::error::EngineError;
use quotabot_types::event::{IncomingEvent, Recipient};
use quotabot_types::session::CommandKind;

use crate::auth::AuthGate;
use crate::command::{CommandOutcome, FeeCommand, FeeFlavor};
use crate::registry::{CommandRegistry, MessageRoute, RegistryError};
use crate::repository::{MessageTracker, SessionStore, TransactionStore};
use crate::sync::SheetSync;
use crate::transport::ChatTransport;

const RETRY_TEXT: &str =
    "⚠️ Si è verificato un problema temporaneo. Riprova tra qualche istante.";
const UNAUTHORIZED_TEXT: &str =
    "❌ Questo bot può essere utilizzato solo nel gruppo autorizzato.";

/// The collaborator bundle the engine runs against.
///
/// Generic over the port traits so the composition root can pin them to
/// the SQLite implementations while tests use in-memory fakes.
pub struct Services<T, S, M, R, X> {
    pub transport: T,
    pub sessions: S,
    pub messages: M,
    pub transactions: R,
    pub sheet: X,
}

/// Engine-level knobs, derived from [`BotConfig`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub session_ttl: Duration,
    pub families: Vec<String>,
    pub contacts: Vec<String>,
    pub cleanup_concurrency: usize,
}

impl EngineConfig {
    pub fn from_bot_config(config: &BotConfig) -> Self {
        Self {
            session_ttl: Duration::minutes(i64::from(config.session_ttl_minutes)),
            families: config.families.clone(),
            contacts: config.contacts.clone(),
            cleanup_concurrency: config.cleanup_concurrency.max(1),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_bot_config(&BotConfig::default())
    }
}

/// Routes each inbound event to exactly one command, or drops it.
pub struct Dispatcher<T, S, M, R, X> {
    services: Services<T, S, M, R, X>,
    registry: CommandRegistry,
    auth: Box<dyn AuthGate>,
    config: EngineConfig,
}

impl<T, S, M, R, X> Dispatcher<T, S, M, R, X>
where
    T: ChatTransport,
    S: SessionStore,
    M: MessageTracker,
    R: TransactionStore,
    X: SheetSync,
{
    /// Build the dispatcher, registering every known command kind.
    /// Duplicate registrations fail here, at startup, not at runtime.
    pub fn new(
        services: Services<T, S, M, R, X>,
        auth: Box<dyn AuthGate>,
        config: EngineConfig,
    ) -> Result<Self, RegistryError> {
        let mut registry = CommandRegistry::new();
        registry.register(FeeFlavor::quota().descriptor())?;
        registry.register(FeeFlavor::iscrizione().descriptor())?;
        Ok(Self {
            services,
            registry,
            auth,
            config,
        })
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn services(&self) -> &Services<T, S, M, R, X> {
        &self.services
    }

    /// Handle one inbound event.
    ///
    /// `Ok(None)` is a routing miss: unrelated chatter, a stale reply, or
    /// an unauthorized chat. Store failures inside a flow degrade to a
    /// retry notice for the user; only transport failures and corrupted
    /// persisted state surface as errors.
    pub async fn handle_event(
        &self,
        event: &IncomingEvent,
    ) -> Result<Option<CommandOutcome>, EngineError> {
        if !self.auth.allows(event.chat_id()) {
            return self.refuse(event).await;
        }

        match self.dispatch(event).await {
            Err(EngineError::Store(err)) => {
                warn!(error = %err, "store failure, asking the user to retry");
                let to = Recipient::Chat(event.chat_id());
                if let Err(send_err) = self.services.transport.send(&to, RETRY_TEXT, None).await
                {
                    warn!(error = %send_err, "could not deliver the retry notice");
                }
                Ok(Some(CommandOutcome::RetryLater))
            }
            other => other,
        }
    }

    /// Unauthorized chat: a start trigger gets an explicit refusal, any
    /// other event is dropped without a trace in the chat.
    async fn refuse(&self, event: &IncomingEvent) -> Result<Option<CommandOutcome>, EngineError> {
        debug!(chat_id = event.chat_id(), "event from unauthorized chat");
        if let IncomingEvent::Message { text, .. } = event {
            if self.registry.find_start(text).is_some() {
                let to = Recipient::Chat(event.chat_id());
                if let Err(err) = self
                    .services
                    .transport
                    .send(&to, UNAUTHORIZED_TEXT, None)
                    .await
                {
                    warn!(error = %err, "could not deliver the refusal notice");
                }
            }
        }
        Ok(None)
    }

    async fn dispatch(
        &self,
        event: &IncomingEvent,
    ) -> Result<Option<CommandOutcome>, EngineError> {
        let user_id = event.user_id();
        let chat_id = event.chat_id();
        let sessions = self.services.sessions.list_active(user_id, chat_id).await?;

        match event {
            IncomingEvent::Message {
                text,
                reply_to_message_id,
                ..
            } => match self
                .registry
                .route_message(text, *reply_to_message_id, &sessions)
            {
                None => {
                    debug!(user_id, chat_id, "no command claimed the message");
                    Ok(None)
                }
                Some(MessageRoute::Start { kind }) => {
                    let existing = self.services.sessions.load(user_id, chat_id, kind).await?;
                    let command = self.command(kind, user_id, chat_id);
                    command.execute(event, existing).await.map(Some)
                }
                Some(MessageRoute::Cancel { session } | MessageRoute::Resume { session }) => {
                    let command = self.command(session.kind, user_id, chat_id);
                    command.execute(event, Some(session.clone())).await.map(Some)
                }
            },
            IncomingEvent::Callback {
                data,
                message_id,
                callback_id,
                ..
            } => match self.registry.route_callback(data, *message_id, &sessions) {
                None => {
                    // Dismiss the client's spinner even for a stale press.
                    if let Err(err) = self
                        .services
                        .transport
                        .answer_callback(callback_id, None)
                        .await
                    {
                        debug!(error = %err, "answer_callback failed");
                    }
                    debug!(user_id, chat_id, "no session claimed the callback");
                    Ok(None)
                }
                Some(session) => {
                    let command = self.command(session.kind, user_id, chat_id);
                    command.execute(event, Some(session.clone())).await.map(Some)
                }
            },
        }
    }

    /// The closed-union dispatch table: every registered kind maps to a
    /// concrete command constructor.
    fn command(
        &self,
        kind: CommandKind,
        user_id: i64,
        chat_id: i64,
    ) -> FeeCommand<'_, T, S, M, R, X> {
        FeeCommand::new(
            FeeFlavor::for_kind(kind),
            &self.services,
            &self.config,
            user_id,
            chat_id,
        )
    }
}
