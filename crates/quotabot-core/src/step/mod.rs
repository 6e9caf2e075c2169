//! The reusable step abstraction.
//!
//! A step is a pure, stateless unit that knows how to present a prompt,
//! validate raw input into a typed value, re-present itself with an error,
//! and optionally react to an inline-button press. Steps know nothing about
//! commands or persistence, which is what lets the same step implementation
//! serve every command; all side effects live in the command layer.

pub mod amount;
pub mod choice;
pub mod contact;
pub mod period;

pub use amount::AmountStep;
pub use choice::ChoiceStep;
pub use contact::ContactStep;
pub use period::PeriodStep;

/// What a step asks the transport to show: prompt text plus an opaque
/// options bag (inline keyboard, formatting flags) forwarded uninterpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub options: Option<serde_json::Value>,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: serde_json::Value) -> Self {
        Self {
            text: text.into(),
            options: Some(keyboard),
        }
    }
}

/// Read-only context a step may weave into its prompt: the command-built
/// recap of what the user has already selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepContext<'a> {
    pub recap: &'a str,
}

impl<'a> StepContext<'a> {
    pub fn new(recap: &'a str) -> Self {
        Self { recap }
    }

    /// Prefix `body` with the recap block, when there is one.
    pub fn compose(&self, body: &str) -> String {
        if self.recap.is_empty() {
            body.to_string()
        } else {
            format!("{}\n\n{}", self.recap, body)
        }
    }
}

/// Outcome of handing an inline-button press to a step.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackAction<T> {
    /// Final selection: the command stores the value and advances.
    Advance(T),
    /// Update the displayed keyboard in place, do not advance (pagination).
    Refresh(Prompt),
    /// The payload does not belong to this step's current state.
    Ignore,
}

/// One unit of prompt-presentation and input-validation.
///
/// `validate` is a pure function: same input, same result, no I/O, and
/// every rejection is a user-displayable string rather than an error type.
pub trait Step {
    type Value;

    /// Build the prompt shown to the user for this step.
    fn present(&self, cx: &StepContext<'_>) -> Prompt;

    /// Parse raw text into the step's typed value.
    fn validate(&self, raw: &str) -> Result<Self::Value, String>;

    /// Re-render the prompt with the error prepended so retries look
    /// consistent.
    fn present_error(&self, cx: &StepContext<'_>, error: &str) -> Prompt {
        let mut prompt = self.present(cx);
        prompt.text = format!("❌ {error}\n\n{}", prompt.text);
        prompt
    }

    /// React to an inline-button press. Steps whose input is text-only keep
    /// the default.
    fn handle_callback(&self, _data: &str, _cx: &StepContext<'_>) -> CallbackAction<Self::Value> {
        CallbackAction::Ignore
    }
}

/// Build the transport options bag for an inline keyboard.
///
/// `rows` holds `(label, callback_data)` pairs. The resulting JSON shape is
/// what the transport forwards to the chat platform verbatim.
pub fn inline_keyboard(rows: &[Vec<(String, String)>]) -> serde_json::Value {
    let keyboard: Vec<Vec<serde_json::Value>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|(label, data)| {
                    serde_json::json!({ "text": label, "callback_data": data })
                })
                .collect()
        })
        .collect();
    serde_json::json!({ "reply_markup": { "inline_keyboard": keyboard } })
}
