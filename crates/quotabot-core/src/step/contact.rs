//! Contact selection step.
//!
//! The contact can be typed as a handle or picked from a paginated inline
//! keyboard. Page-turn presses refresh the keyboard in place without
//! advancing the flow; a pick is a final selection.

use super::{inline_keyboard, CallbackAction, Prompt, Step, StepContext};

const PROMPT: &str = "👤 Scegli il contatto da notificare, oppure rispondi con lo username (es. @mario).";

/// Typed or button-picked contact handle, normalized to `@name`.
pub struct ContactStep {
    namespace: &'static str,
    contacts: Vec<String>,
    page_size: usize,
}

impl ContactStep {
    pub fn new(namespace: &'static str, contacts: Vec<String>, page_size: usize) -> Self {
        Self {
            namespace,
            contacts,
            page_size: page_size.max(1),
        }
    }

    fn page_count(&self) -> usize {
        self.contacts.len().div_ceil(self.page_size)
    }

    /// Keyboard for one page: one contact per row plus a navigation row.
    /// Buttons carry global indices so a pick is unambiguous on any page.
    fn keyboard(&self, page: usize) -> serde_json::Value {
        let start = page * self.page_size;
        let mut rows: Vec<Vec<(String, String)>> = self
            .contacts
            .iter()
            .enumerate()
            .skip(start)
            .take(self.page_size)
            .map(|(idx, contact)| {
                vec![(contact.clone(), format!("{}:pick:{idx}", self.namespace))]
            })
            .collect();

        let mut nav = Vec::new();
        if page > 0 {
            nav.push(("⬅️".to_string(), format!("{}:page:{}", self.namespace, page - 1)));
        }
        if page + 1 < self.page_count() {
            nav.push(("➡️".to_string(), format!("{}:page:{}", self.namespace, page + 1)));
        }
        if !nav.is_empty() {
            rows.push(nav);
        }
        inline_keyboard(&rows)
    }

    fn page_prompt(&self, cx: &StepContext<'_>, page: usize) -> Prompt {
        if self.contacts.is_empty() {
            Prompt::text(cx.compose(PROMPT))
        } else {
            Prompt::with_keyboard(cx.compose(PROMPT), self.keyboard(page))
        }
    }
}

impl Step for ContactStep {
    type Value = String;

    fn present(&self, cx: &StepContext<'_>) -> Prompt {
        self.page_prompt(cx, 0)
    }

    fn validate(&self, raw: &str) -> Result<String, String> {
        let typed = raw.trim();
        let handle = typed.strip_prefix('@').unwrap_or(typed);
        if handle.is_empty() {
            return Err("Inserisci uno username (es. @mario).".to_string());
        }
        if handle.chars().any(char::is_whitespace) {
            return Err("Lo username non può contenere spazi.".to_string());
        }
        Ok(format!("@{handle}"))
    }

    fn handle_callback(&self, data: &str, cx: &StepContext<'_>) -> CallbackAction<String> {
        let Some(rest) = data
            .strip_prefix(self.namespace)
            .and_then(|rest| rest.strip_prefix(':'))
        else {
            return CallbackAction::Ignore;
        };

        if let Some(page) = rest.strip_prefix("page:").and_then(|p| p.parse::<usize>().ok()) {
            if page < self.page_count() {
                return CallbackAction::Refresh(self.page_prompt(cx, page));
            }
            return CallbackAction::Ignore;
        }

        if let Some(index) = rest.strip_prefix("pick:").and_then(|i| i.parse::<usize>().ok()) {
            if let Some(contact) = self.contacts.get(index) {
                // Configured contacts go through the same normalization as
                // typed input.
                return match self.validate(contact) {
                    Ok(handle) => CallbackAction::Advance(handle),
                    Err(_) => CallbackAction::Ignore,
                };
            }
        }
        CallbackAction::Ignore
    }
}
