//! Fee registration command.
//!
//! One command implementation serves both `/quota` (monthly fee) and
//! `/iscrizione` (enrollment fee): the two kinds differ only in their
//! `FeeFlavor`, and both walk the same step sequence
//! Family -> Amount -> Period -> Contact.
//!
//! All durable state lives in the session row; the command instance is
//! rebuilt from scratch for every inbound event.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use quotabot_types::error::{EngineError, SessionStateError, SyncError};
use quotabot_types::event::{IncomingEvent, Recipient};
use quotabot_types::session::{CommandKind, Session};
use quotabot_types::transaction::{format_cents, Period, Transaction};

use crate::dispatcher::{EngineConfig, Services};
use crate::registry::{matches_trigger, CommandDescriptor, CANCEL_TRIGGER};
use crate::repository::{MessageTracker, SessionStore, TransactionStore};
use crate::step::{
    AmountStep, CallbackAction, ChoiceStep, ContactStep, PeriodStep, Prompt, Step, StepContext,
};
use crate::sync::SheetSync;
use crate::transport::ChatTransport;

use super::flow::Flow;
use super::CommandOutcome;

/// Contacts shown per page of the picker keyboard.
const CONTACTS_PER_PAGE: usize = 5;

const CANCELLED_TEXT: &str = "❌ Operazione annullata.";

/// Where a fee flow currently is. Persisted as the session's step string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeStep {
    Family,
    Amount,
    Period,
    Contact,
}

impl fmt::Display for FeeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeStep::Family => write!(f, "family"),
            FeeStep::Amount => write!(f, "amount"),
            FeeStep::Period => write!(f, "period"),
            FeeStep::Contact => write!(f, "contact"),
        }
    }
}

impl FromStr for FeeStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "family" => Ok(FeeStep::Family),
            "amount" => Ok(FeeStep::Amount),
            "period" => Ok(FeeStep::Period),
            "contact" => Ok(FeeStep::Contact),
            other => Err(format!("invalid fee step: '{other}'")),
        }
    }
}

/// What distinguishes `/quota` from `/iscrizione`: trigger and category.
#[derive(Debug, Clone, Copy)]
pub struct FeeFlavor {
    pub kind: CommandKind,
    pub trigger: &'static str,
    pub category: &'static str,
}

impl FeeFlavor {
    pub fn quota() -> Self {
        Self {
            kind: CommandKind::Quota,
            trigger: "quota",
            category: "Quota Mensile",
        }
    }

    pub fn iscrizione() -> Self {
        Self {
            kind: CommandKind::Iscrizione,
            trigger: "iscrizione",
            category: "Quota Iscrizione",
        }
    }

    pub fn for_kind(kind: CommandKind) -> Self {
        match kind {
            CommandKind::Quota => Self::quota(),
            CommandKind::Iscrizione => Self::iscrizione(),
        }
    }

    /// Routing facts handed to the registry at startup.
    pub fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor {
            kind: self.kind,
            trigger: self.trigger,
            callback_namespaces: &["family", "contact"],
        }
    }
}

/// Partially collected fields, stored as the session's draft payload.
///
/// The store only sees an opaque JSON blob; this type is parsed back out
/// immediately after load and nothing downstream touches untyped maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeDraft {
    pub family: Option<String>,
    pub amount_cents: Option<i64>,
    pub period: Option<Period>,
    pub contact: Option<String>,
}

impl FeeDraft {
    /// Parse the draft out of a loaded session. A malformed payload is
    /// corruption and is reported, never reset to defaults.
    pub fn from_session(session: &Session) -> Result<Self, SessionStateError> {
        if session.data.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(session.data.clone())
            .map_err(|e| SessionStateError::MalformedData(e.to_string()))
    }

    fn store_into(&self, session: &mut Session) -> Result<(), SessionStateError> {
        session.data = serde_json::to_value(self)
            .map_err(|e| SessionStateError::MalformedData(e.to_string()))?;
        Ok(())
    }

    /// Recap of everything collected so far, prepended to every prompt.
    fn recap(&self, category: &str) -> String {
        let mut lines = vec![format!("📂 Categoria: {category}")];
        if let Some(family) = &self.family {
            lines.push(format!("👨‍👩‍👧‍👦 Famiglia: {family}"));
        }
        if let Some(cents) = self.amount_cents {
            lines.push(format!("💰 Importo: €{}", format_cents(cents)));
        }
        if let Some(period) = &self.period {
            lines.push(format!("📅 Periodo: {period}"));
        }
        if let Some(contact) = &self.contact {
            lines.push(format!("👤 Contatto: {contact}"));
        }
        lines.join("\n")
    }
}

/// The fee registration flow.
pub struct FeeCommand<'a, T, S, M, R, X> {
    flavor: FeeFlavor,
    flow: Flow<'a, T, S, M>,
    transport: &'a T,
    transactions: &'a R,
    sheet: &'a X,
    config: &'a EngineConfig,
    user_id: i64,
    chat_id: i64,
}

impl<'a, T, S, M, R, X> FeeCommand<'a, T, S, M, R, X>
where
    T: ChatTransport,
    S: SessionStore,
    M: MessageTracker,
    R: TransactionStore,
    X: SheetSync,
{
    pub fn new(
        flavor: FeeFlavor,
        services: &'a Services<T, S, M, R, X>,
        config: &'a EngineConfig,
        user_id: i64,
        chat_id: i64,
    ) -> Self {
        Self {
            flavor,
            flow: Flow::new(
                &services.transport,
                &services.sessions,
                &services.messages,
                chat_id,
                config.cleanup_concurrency,
            ),
            transport: &services.transport,
            transactions: &services.transactions,
            sheet: &services.sheet,
            config,
            user_id,
            chat_id,
        }
    }

    fn ttl(&self) -> Duration {
        self.config.session_ttl
    }

    fn family_step(&self) -> ChoiceStep {
        ChoiceStep::new(
            "Seleziona la famiglia:",
            "family",
            self.config.families.clone(),
        )
    }

    fn contact_step(&self) -> ContactStep {
        ContactStep::new("contact", self.config.contacts.clone(), CONTACTS_PER_PAGE)
    }

    fn parse_step(&self, session: &Session) -> Result<FeeStep, SessionStateError> {
        session
            .step
            .parse()
            .map_err(|_: String| SessionStateError::UnknownStep {
                kind: self.flavor.kind.to_string(),
                step: session.step.clone(),
            })
    }

    /// Render one step's prompt, with the validation error prepended when
    /// re-presenting after a rejection.
    fn render(&self, step: FeeStep, draft: &FeeDraft, error: Option<&str>) -> Prompt {
        fn pick<P: Step>(step: &P, cx: &StepContext<'_>, error: Option<&str>) -> Prompt {
            match error {
                None => step.present(cx),
                Some(e) => step.present_error(cx, e),
            }
        }

        let recap = draft.recap(self.flavor.category);
        let cx = StepContext::new(&recap);
        match step {
            FeeStep::Family => pick(&self.family_step(), &cx, error),
            FeeStep::Amount => pick(&AmountStep, &cx, error),
            FeeStep::Period => pick(&PeriodStep, &cx, error),
            FeeStep::Contact => pick(&self.contact_step(), &cx, error),
        }
    }

    /// Single entry point: branches on the start trigger, the cancel
    /// trigger, free text for the current step, or a button press.
    pub async fn execute(
        &self,
        event: &IncomingEvent,
        session: Option<Session>,
    ) -> Result<CommandOutcome, EngineError> {
        match event {
            IncomingEvent::Message {
                text,
                message_id,
                username,
                ..
            } => {
                if matches_trigger(text, self.flavor.trigger) {
                    self.start(session).await
                } else if matches_trigger(text, CANCEL_TRIGGER) {
                    match session {
                        Some(session) => self.cancel(session).await,
                        None => Ok(CommandOutcome::Ignored),
                    }
                } else {
                    match session {
                        Some(session) => {
                            self.handle_text(session, text, *message_id, username.as_deref())
                                .await
                        }
                        None => Ok(CommandOutcome::Ignored),
                    }
                }
            }
            IncomingEvent::Callback {
                callback_id,
                data,
                username,
                ..
            } => match session {
                Some(session) => {
                    self.handle_callback(session, callback_id, data, username.as_deref())
                        .await
                }
                None => Ok(CommandOutcome::Ignored),
            },
        }
    }

    /// Start (or restart) the flow.
    ///
    /// Re-issuing the start trigger mid-flow discards the previous session
    /// and its messages: the documented restart policy for this command.
    async fn start(&self, existing: Option<Session>) -> Result<CommandOutcome, EngineError> {
        if let Some(old) = existing {
            info!(
                user_id = self.user_id,
                kind = %self.flavor.kind,
                "restarting in-progress flow"
            );
            self.flow.cleanup_messages(&old, false).await?;
            self.flow.delete_session(&old).await?;
        }

        let mut session = Session::new(
            self.user_id,
            self.chat_id,
            self.flavor.kind,
            FeeStep::Family.to_string(),
            self.ttl(),
        );
        let draft = FeeDraft::default();
        draft.store_into(&mut session)?;
        // Persist before the prompt goes out: a store failure here leaves
        // nothing visible to the user.
        self.flow.save_session(&session).await?;

        let prompt = self.render(FeeStep::Family, &draft, None);
        self.flow.send_prompt(&mut session, &prompt).await?;
        // Record the prompt id: it is the thread-gate target.
        self.flow.save_session(&session).await?;
        Ok(CommandOutcome::Started)
    }

    /// User-driven cancellation: drop the session and its messages.
    async fn cancel(&self, session: Session) -> Result<CommandOutcome, EngineError> {
        self.flow.cleanup_messages(&session, false).await?;
        self.flow.delete_session(&session).await?;
        self.transport
            .send(&Recipient::Chat(self.chat_id), CANCELLED_TEXT, None)
            .await?;
        info!(user_id = self.user_id, kind = %self.flavor.kind, "flow cancelled");
        Ok(CommandOutcome::Cancelled)
    }

    async fn handle_text(
        &self,
        mut session: Session,
        text: &str,
        message_id: i64,
        username: Option<&str>,
    ) -> Result<CommandOutcome, EngineError> {
        let mut draft = FeeDraft::from_session(&session)?;
        let step = self.parse_step(&session)?;
        self.flow.track_incoming(&session, message_id).await?;

        match step {
            FeeStep::Family => match self.family_step().validate(text) {
                Ok(family) => {
                    draft.family = Some(family);
                    self.advance(&mut session, &draft, FeeStep::Amount, false).await
                }
                Err(error) => self.reject(&mut session, step, &draft, &error).await,
            },
            FeeStep::Amount => match AmountStep.validate(text) {
                Ok(cents) => {
                    draft.amount_cents = Some(cents);
                    self.advance(&mut session, &draft, FeeStep::Period, false).await
                }
                Err(error) => self.reject(&mut session, step, &draft, &error).await,
            },
            FeeStep::Period => match PeriodStep.validate(text) {
                Ok(period) => {
                    draft.period = Some(period);
                    self.advance(&mut session, &draft, FeeStep::Contact, false).await
                }
                Err(error) => self.reject(&mut session, step, &draft, &error).await,
            },
            FeeStep::Contact => match self.contact_step().validate(text) {
                Ok(contact) => {
                    draft.contact = Some(contact);
                    self.complete(session, draft, username).await
                }
                Err(error) => self.reject(&mut session, step, &draft, &error).await,
            },
        }
    }

    async fn handle_callback(
        &self,
        mut session: Session,
        callback_id: &str,
        data: &str,
        username: Option<&str>,
    ) -> Result<CommandOutcome, EngineError> {
        // Acknowledge first so the client stops its spinner; best-effort.
        if let Err(err) = self.transport.answer_callback(callback_id, None).await {
            debug!(error = %err, "answer_callback failed");
        }

        let mut draft = FeeDraft::from_session(&session)?;
        let step = self.parse_step(&session)?;
        let recap = draft.recap(self.flavor.category);
        let cx = StepContext::new(&recap);

        match step {
            FeeStep::Family => match self.family_step().handle_callback(data, &cx) {
                CallbackAction::Advance(family) => {
                    draft.family = Some(family);
                    self.advance(&mut session, &draft, FeeStep::Amount, true).await
                }
                CallbackAction::Refresh(prompt) => {
                    self.flow.edit_last(&mut session, &prompt).await?;
                    self.flow.save_session(&session).await?;
                    Ok(CommandOutcome::KeyboardUpdated)
                }
                CallbackAction::Ignore => Ok(CommandOutcome::Ignored),
            },
            FeeStep::Contact => match self.contact_step().handle_callback(data, &cx) {
                CallbackAction::Advance(contact) => {
                    draft.contact = Some(contact);
                    self.complete(session, draft, username).await
                }
                CallbackAction::Refresh(prompt) => {
                    self.flow.edit_last(&mut session, &prompt).await?;
                    self.flow.save_session(&session).await?;
                    Ok(CommandOutcome::KeyboardUpdated)
                }
                CallbackAction::Ignore => Ok(CommandOutcome::Ignored),
            },
            // Text-only steps: a stale keyboard press must not move the
            // flow, forwards or backwards.
            FeeStep::Amount | FeeStep::Period => Ok(CommandOutcome::Ignored),
        }
    }

    /// Persist the validated input, then present the next step.
    ///
    /// The session is saved *before* anything is sent so that a store
    /// failure surfaces while the user's view is still consistent and a
    /// retry is idempotent.
    async fn advance(
        &self,
        session: &mut Session,
        draft: &FeeDraft,
        next: FeeStep,
        via_edit: bool,
    ) -> Result<CommandOutcome, EngineError> {
        draft.store_into(session)?;
        session.step = next.to_string();
        session.touch(self.ttl());
        self.flow.save_session(session).await?;

        let prompt = self.render(next, draft, None);
        if via_edit {
            self.flow.edit_last(session, &prompt).await?;
        } else {
            self.flow.send_prompt(session, &prompt).await?;
        }
        self.flow.save_session(session).await?;

        debug!(
            user_id = self.user_id,
            kind = %self.flavor.kind,
            step = %next,
            "step advanced"
        );
        Ok(CommandOutcome::Advanced {
            step: next.to_string(),
        })
    }

    /// The ask-again path: re-present the step with the error prepended.
    /// The step does not move; the fresh prompt becomes the thread-gate
    /// target for the next attempt.
    async fn reject(
        &self,
        session: &mut Session,
        step: FeeStep,
        draft: &FeeDraft,
        error: &str,
    ) -> Result<CommandOutcome, EngineError> {
        let prompt = self.render(step, draft, Some(error));
        self.flow.send_prompt(session, &prompt).await?;
        session.touch(self.ttl());
        self.flow.save_session(session).await?;
        Ok(CommandOutcome::Rejected)
    }

    /// Final step accepted: store the record, export, notify, confirm,
    /// and tear the conversation down.
    async fn complete(
        &self,
        mut session: Session,
        draft: FeeDraft,
        username: Option<&str>,
    ) -> Result<CommandOutcome, EngineError> {
        let record = self.build_payload(&draft, username)?;
        self.transactions.insert(&record).await?;
        info!(
            transaction_id = %record.id,
            kind = %self.flavor.kind,
            family = %record.family,
            "transaction registered"
        );

        // The record is durable; export failure only warrants a warning,
        // and an export that was never configured not even that.
        let sheet_failed = match self.sheet.append(&record).await {
            Ok(()) => false,
            Err(SyncError::NotConfigured) => {
                debug!("sheet sync not configured, skipping");
                false
            }
            Err(err) => {
                warn!(error = %err, "sheet sync failed");
                true
            }
        };

        let notified = match self
            .transport
            .send(
                &Recipient::Username(record.contact.clone()),
                &notification_text(&record),
                None,
            )
            .await
        {
            Ok(_) => true,
            Err(err) => {
                warn!(contact = %record.contact, error = %err, "contact notification failed");
                false
            }
        };

        let summary = summary_text(&record, notified, sheet_failed);
        self.flow
            .send_prompt(&mut session, &Prompt::text(summary))
            .await?;
        let report = self.flow.cleanup_messages(&session, true).await?;
        debug!(
            deleted = report.deleted,
            failed = report.failed,
            "conversation scaffolding removed"
        );
        self.flow.delete_session(&session).await?;

        Ok(CommandOutcome::Completed {
            transaction_id: record.id,
        })
    }

    /// Pure mapping from the accumulated draft to the business record,
    /// splitting the period into month/year columns.
    fn build_payload(
        &self,
        draft: &FeeDraft,
        username: Option<&str>,
    ) -> Result<Transaction, SessionStateError> {
        let family = draft.family.clone().ok_or_else(|| missing("family"))?;
        let amount_cents = draft.amount_cents.ok_or_else(|| missing("amount"))?;
        let period = draft.period.ok_or_else(|| missing("period"))?;
        let contact = draft.contact.clone().ok_or_else(|| missing("contact"))?;

        Ok(Transaction {
            id: Uuid::now_v7(),
            family,
            category: self.flavor.category.to_string(),
            amount_cents,
            month: period.month,
            year: period.year,
            contact,
            registered_by: self.user_id,
            registered_by_username: username.map(String::from),
            created_at: Utc::now(),
        })
    }
}

fn missing(field: &str) -> SessionStateError {
    SessionStateError::MalformedData(format!("missing field '{field}' at completion"))
}

fn notification_text(record: &Transaction) -> String {
    let registered_by = record
        .registered_by_username
        .as_deref()
        .map(|u| format!("@{u}"))
        .unwrap_or_else(|| "un utente".to_string());
    format!(
        "🔔 Nuova transazione registrata\n\n\
         👨‍👩‍👧‍👦 Famiglia: {}\n\
         📂 Categoria: {}\n\
         💰 Importo: €{}\n\
         📅 Periodo: {}\n\
         👤 Registrato da: {}",
        record.family,
        record.category,
        format_cents(record.amount_cents),
        record.period(),
        registered_by,
    )
}

fn summary_text(record: &Transaction, notified: bool, sheet_failed: bool) -> String {
    let mut text = format!(
        "✅ Transazione registrata!\n\n\
         👨‍👩‍👧‍👦 Famiglia: {}\n\
         📂 Categoria: {}\n\
         💰 Importo: €{}\n\
         📅 Periodo: {}\n\
         👤 Contatto: {}",
        record.family,
        record.category,
        format_cents(record.amount_cents),
        record.period(),
        record.contact,
    );
    if notified {
        text.push_str(&format!("\n\n📨 Notifica inviata a {}", record.contact));
    } else {
        text.push_str(&format!(
            "\n\n⚠️ Non è stato possibile notificare {}. Verifica che lo username sia corretto.",
            record.contact
        ));
    }
    if sheet_failed {
        text.push_str("\n⚠️ Esportazione sul foglio non riuscita; la transazione è comunque salvata.");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Services;
    use crate::test_support::{
        FakeTransport, MemSessions, MemTracker, MemTransactions, RecordingSheet, SheetMode,
    };

    const USER: i64 = 7;
    const CHAT: i64 = -100;

    fn services(
        sheet_mode: SheetMode,
    ) -> Services<FakeTransport, MemSessions, MemTracker, MemTransactions, RecordingSheet> {
        Services {
            transport: FakeTransport::new(),
            sessions: MemSessions::new(),
            messages: MemTracker::new(),
            transactions: MemTransactions::new(),
            sheet: RecordingSheet::new(sheet_mode),
        }
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.contacts = vec!["@anna".to_string(), "@bruno".to_string()];
        config
    }

    fn command<'a>(
        services: &'a Services<FakeTransport, MemSessions, MemTracker, MemTransactions, RecordingSheet>,
        config: &'a EngineConfig,
    ) -> FeeCommand<'a, FakeTransport, MemSessions, MemTracker, MemTransactions, RecordingSheet>
    {
        FeeCommand::new(FeeFlavor::quota(), services, config, USER, CHAT)
    }

    fn message(text: &str, reply_to: Option<i64>) -> IncomingEvent {
        IncomingEvent::Message {
            user_id: USER,
            chat_id: CHAT,
            message_id: 500,
            text: text.to_string(),
            username: Some("mario".to_string()),
            reply_to_message_id: reply_to,
        }
    }

    fn callback(data: &str, message_id: i64) -> IncomingEvent {
        IncomingEvent::Callback {
            user_id: USER,
            chat_id: CHAT,
            message_id,
            callback_id: "cb1".to_string(),
            data: data.to_string(),
            username: Some("mario".to_string()),
        }
    }

    async fn current_session(
        services: &Services<FakeTransport, MemSessions, MemTracker, MemTransactions, RecordingSheet>,
    ) -> Session {
        crate::repository::SessionStore::load(&services.sessions, USER, CHAT, CommandKind::Quota)
            .await
            .unwrap()
            .expect("session should exist")
    }

    /// Drive the flow up to the contact step with text replies.
    async fn advance_to_contact(
        services: &Services<FakeTransport, MemSessions, MemTracker, MemTransactions, RecordingSheet>,
        config: &EngineConfig,
    ) -> Session {
        let cmd = command(services, config);
        cmd.execute(&message("/quota", None), None).await.unwrap();

        let session = current_session(services).await;
        cmd.execute(&message("Rossi", session.last_message_id), Some(session))
            .await
            .unwrap();

        let session = current_session(services).await;
        cmd.execute(&message("25,50", session.last_message_id), Some(session))
            .await
            .unwrap();

        let session = current_session(services).await;
        cmd.execute(&message("08-2026", session.last_message_id), Some(session))
            .await
            .unwrap();

        current_session(services).await
    }

    #[tokio::test]
    async fn test_start_creates_session_at_family_step() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let cmd = command(&services, &config);

        let outcome = cmd.execute(&message("/quota", None), None).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Started);

        let session = current_session(&services).await;
        assert_eq!(session.step, "family");
        assert!(session.last_message_id.is_some());

        let sent = services.transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("Seleziona la famiglia"));
        assert!(sent[0].has_options);
    }

    #[tokio::test]
    async fn test_valid_reply_advances_family_to_amount() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let cmd = command(&services, &config);
        cmd.execute(&message("/quota", None), None).await.unwrap();

        let session = current_session(&services).await;
        let outcome = cmd
            .execute(&message("Rossi", session.last_message_id), Some(session))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Advanced {
                step: "amount".to_string()
            }
        );

        let session = current_session(&services).await;
        assert_eq!(session.step, "amount");
        let draft = FeeDraft::from_session(&session).unwrap();
        assert_eq!(draft.family.as_deref(), Some("Rossi"));
    }

    #[tokio::test]
    async fn test_invalid_amount_is_rejected_without_advancing() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let cmd = command(&services, &config);
        cmd.execute(&message("/quota", None), None).await.unwrap();
        let session = current_session(&services).await;
        cmd.execute(&message("Rossi", session.last_message_id), Some(session))
            .await
            .unwrap();

        let session = current_session(&services).await;
        let outcome = cmd
            .execute(&message("-5", session.last_message_id), Some(session))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Rejected);

        let session = current_session(&services).await;
        assert_eq!(session.step, "amount");

        // The error prompt repeats the step's original text.
        let last = services.transport.sent_texts().pop().unwrap();
        assert!(last.contains("❌"));
        assert!(last.contains("Inserisci l'importo"));
    }

    #[tokio::test]
    async fn test_family_callback_advances_via_edit() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let cmd = command(&services, &config);
        cmd.execute(&message("/quota", None), None).await.unwrap();

        let session = current_session(&services).await;
        let prompt_id = session.last_message_id.unwrap();
        let outcome = cmd
            .execute(&callback("family:0", prompt_id), Some(session))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Advanced {
                step: "amount".to_string()
            }
        );

        // Advanced by editing the keyboard message, not by sending anew.
        assert_eq!(services.transport.sent().len(), 1);
        let edits = services.transport.edited();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0, prompt_id);
        assert!(edits[0].1.contains("Famiglia: Rossi"));
        assert_eq!(services.transport.answered().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_family_callback_at_amount_step_is_ignored() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let cmd = command(&services, &config);
        cmd.execute(&message("/quota", None), None).await.unwrap();
        let session = current_session(&services).await;
        cmd.execute(&message("Rossi", session.last_message_id), Some(session))
            .await
            .unwrap();

        let session = current_session(&services).await;
        let prompt_id = session.last_message_id.unwrap();
        let outcome = cmd
            .execute(&callback("family:1", prompt_id), Some(session))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Ignored);

        // No backward transition: still at amount with the original family.
        let session = current_session(&services).await;
        assert_eq!(session.step, "amount");
        let draft = FeeDraft::from_session(&session).unwrap();
        assert_eq!(draft.family.as_deref(), Some("Rossi"));
    }

    #[tokio::test]
    async fn test_contact_pagination_refreshes_without_advancing() {
        let services = services(SheetMode::NotConfigured);
        let mut config = config();
        config.contacts = (0..7).map(|i| format!("@utente{i}")).collect();
        let session = advance_to_contact(&services, &config).await;
        let prompt_id = session.last_message_id.unwrap();

        let cmd = command(&services, &config);
        let outcome = cmd
            .execute(&callback("contact:page:1", prompt_id), Some(session))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::KeyboardUpdated);

        let session = current_session(&services).await;
        assert_eq!(session.step, "contact");
        assert!(!services.transport.edited().is_empty());
    }

    #[tokio::test]
    async fn test_completion_stores_record_and_tears_down() {
        let services = services(SheetMode::Ok);
        let config = config();
        let session = advance_to_contact(&services, &config).await;

        let cmd = command(&services, &config);
        let outcome = cmd
            .execute(
                &message("@carla", session.last_message_id),
                Some(session.clone()),
            )
            .await
            .unwrap();
        let CommandOutcome::Completed { transaction_id } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };

        // The record matches the collected draft, period split applied.
        let stored = services.transactions.all();
        assert_eq!(stored.len(), 1);
        let record = &stored[0];
        assert_eq!(record.id, transaction_id);
        assert_eq!(record.family, "Rossi");
        assert_eq!(record.category, "Quota Mensile");
        assert_eq!(record.amount_cents, 2550);
        assert_eq!(record.month, 8);
        assert_eq!(record.year, 2026);
        assert_eq!(record.contact, "@carla");
        assert_eq!(record.registered_by, USER);

        // Session gone, sheet row pushed, contact notified.
        assert!(
            crate::repository::SessionStore::load(&services.sessions, USER, CHAT, CommandKind::Quota)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(services.sheet.appended(), vec![transaction_id]);
        let notification = services
            .transport
            .sent()
            .into_iter()
            .find(|m| m.to == Recipient::Username("@carla".to_string()))
            .expect("notification should be sent");
        assert!(notification.text.contains("Nuova transazione"));

        // Only the flagged summary row survives in the tracker.
        let remaining = services.messages.list(&session.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].is_last);
        let summary = services.transport.sent_texts().pop().unwrap();
        assert!(summary.contains("✅ Transazione registrata"));
        assert!(summary.contains("📨 Notifica inviata a @carla"));
    }

    #[tokio::test]
    async fn test_completion_warns_when_notification_fails() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let session = advance_to_contact(&services, &config).await;

        services.transport.fail_username_sends();
        let cmd = command(&services, &config);
        let outcome = cmd
            .execute(&message("@carla", session.last_message_id), Some(session))
            .await
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Completed { .. }));

        // Record stored anyway; summary carries the warning, not the
        // not-configured sheet notice.
        assert_eq!(services.transactions.all().len(), 1);
        let summary = services.transport.sent_texts().pop().unwrap();
        assert!(summary.contains("Non è stato possibile notificare @carla"));
        assert!(!summary.contains("Esportazione sul foglio"));
    }

    #[tokio::test]
    async fn test_completion_warns_when_sheet_push_fails() {
        let services = services(SheetMode::Fail);
        let config = config();
        let session = advance_to_contact(&services, &config).await;

        let cmd = command(&services, &config);
        cmd.execute(&message("@carla", session.last_message_id), Some(session))
            .await
            .unwrap();

        assert_eq!(services.transactions.all().len(), 1);
        let summary = services.transport.sent_texts().pop().unwrap();
        assert!(summary.contains("Esportazione sul foglio non riuscita"));
    }

    #[tokio::test]
    async fn test_restart_discards_previous_session() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let cmd = command(&services, &config);
        cmd.execute(&message("/quota", None), None).await.unwrap();
        let first = current_session(&services).await;
        cmd.execute(&message("Rossi", first.last_message_id), Some(first.clone()))
            .await
            .unwrap();

        // Second /quota before completion: fresh session at family.
        let mid = current_session(&services).await;
        let outcome = cmd
            .execute(&message("/quota", None), Some(mid))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Started);

        let fresh = current_session(&services).await;
        assert_ne!(fresh.id, first.id);
        assert_eq!(fresh.step, "family");
        let draft = FeeDraft::from_session(&fresh).unwrap();
        assert!(draft.family.is_none());
        // The old conversation's messages were cleaned out of the chat.
        assert!(!services.transport.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_deletes_session_and_messages() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let cmd = command(&services, &config);
        cmd.execute(&message("/quota", None), None).await.unwrap();

        let session = current_session(&services).await;
        let outcome = cmd
            .execute(&message("/annulla", None), Some(session.clone()))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Cancelled);

        assert!(
            crate::repository::SessionStore::load(&services.sessions, USER, CHAT, CommandKind::Quota)
                .await
                .unwrap()
                .is_none()
        );
        assert!(services.messages.list(&session.id).await.unwrap().is_empty());
        let last = services.transport.sent_texts().pop().unwrap();
        assert_eq!(last, CANCELLED_TEXT);
    }

    #[tokio::test]
    async fn test_unknown_persisted_step_is_reported_as_corruption() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let cmd = command(&services, &config);
        cmd.execute(&message("/quota", None), None).await.unwrap();

        let mut session = current_session(&services).await;
        session.step = "cetriolo".to_string();
        let err = cmd
            .execute(&message("Rossi", session.last_message_id), Some(session))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Session(SessionStateError::UnknownStep { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_draft_is_reported_as_corruption() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let cmd = command(&services, &config);
        cmd.execute(&message("/quota", None), None).await.unwrap();

        let mut session = current_session(&services).await;
        session.data = serde_json::json!({ "amount_cents": "venticinque" });
        let err = cmd
            .execute(&message("Rossi", session.last_message_id), Some(session))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Session(SessionStateError::MalformedData(_))
        ));
    }

    #[tokio::test]
    async fn test_step_never_moves_backwards_on_valid_inputs() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let cmd = command(&services, &config);
        cmd.execute(&message("/quota", None), None).await.unwrap();

        let order = ["family", "amount", "period", "contact"];
        let mut seen = vec![current_session(&services).await.step.clone()];
        for input in ["Rossi", "25,50", "08-2026"] {
            let session = current_session(&services).await;
            cmd.execute(&message(input, session.last_message_id), Some(session))
                .await
                .unwrap();
            seen.push(current_session(&services).await.step.clone());
        }
        let indices: Vec<usize> = seen
            .iter()
            .map(|s| order.iter().position(|o| o == s).unwrap())
            .collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_build_payload_requires_every_field() {
        let services = services(SheetMode::NotConfigured);
        let config = config();
        let cmd = command(&services, &config);

        let draft = FeeDraft {
            family: Some("Rossi".to_string()),
            amount_cents: Some(2550),
            period: None,
            contact: Some("@carla".to_string()),
        };
        let err = cmd.build_payload(&draft, None).unwrap_err();
        assert!(err.to_string().contains("period"));
    }
}
