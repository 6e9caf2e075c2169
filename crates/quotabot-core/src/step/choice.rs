//! Fixed-list selection step.

use super::{inline_keyboard, CallbackAction, Prompt, Step, StepContext};

/// Pick one option from a fixed list, by button or by typed text.
///
/// Buttons carry `"{namespace}:{index}"` so the payload stays within the
/// transport's callback-data size limit regardless of option length. Typed
/// input is matched case-insensitively against the option labels.
pub struct ChoiceStep {
    title: String,
    namespace: &'static str,
    options: Vec<String>,
}

impl ChoiceStep {
    pub fn new(title: impl Into<String>, namespace: &'static str, options: Vec<String>) -> Self {
        Self {
            title: title.into(),
            namespace,
            options,
        }
    }

    fn keyboard(&self) -> serde_json::Value {
        let rows: Vec<Vec<(String, String)>> = self
            .options
            .iter()
            .enumerate()
            .map(|(idx, option)| vec![(option.clone(), format!("{}:{idx}", self.namespace))])
            .collect();
        inline_keyboard(&rows)
    }
}

impl Step for ChoiceStep {
    type Value = String;

    fn present(&self, cx: &StepContext<'_>) -> Prompt {
        Prompt::with_keyboard(cx.compose(&self.title), self.keyboard())
    }

    fn validate(&self, raw: &str) -> Result<String, String> {
        let typed = raw.trim();
        self.options
            .iter()
            .find(|option| option.eq_ignore_ascii_case(typed))
            .cloned()
            .ok_or_else(|| {
                format!(
                    "Scelta non valida. Le opzioni sono: {}.",
                    self.options.join(", ")
                )
            })
    }

    fn handle_callback(&self, data: &str, _cx: &StepContext<'_>) -> CallbackAction<String> {
        let Some(index) = data.strip_prefix(self.namespace).and_then(|rest| {
            rest.strip_prefix(':')?.parse::<usize>().ok()
        }) else {
            return CallbackAction::Ignore;
        };
        match self.options.get(index) {
            Some(option) => CallbackAction::Advance(option.clone()),
            None => CallbackAction::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn families() -> ChoiceStep {
        ChoiceStep::new(
            "Seleziona la famiglia:",
            "family",
            vec!["Rossi".to_string(), "Bianchi".to_string()],
        )
    }

    #[test]
    fn test_present_builds_one_button_per_option() {
        let prompt = families().present(&StepContext::default());
        let kb = prompt.options.unwrap();
        let rows = kb["reply_markup"]["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0]["callback_data"], "family:1");
    }

    #[test]
    fn test_validate_accepts_typed_option() {
        assert_eq!(families().validate("Rossi").unwrap(), "Rossi");
        assert_eq!(families().validate("  rossi  ").unwrap(), "Rossi");
    }

    #[test]
    fn test_validate_rejects_unknown_option() {
        let err = families().validate("Gialli").unwrap_err();
        assert!(err.contains("Rossi"));
        assert!(err.contains("Bianchi"));
    }

    #[test]
    fn test_validate_is_idempotent() {
        let step = families();
        assert_eq!(step.validate("Rossi"), step.validate("Rossi"));
        assert_eq!(step.validate("Gialli"), step.validate("Gialli"));
    }

    #[test]
    fn test_callback_advances_on_valid_index() {
        match families().handle_callback("family:0", &StepContext::default()) {
            CallbackAction::Advance(value) => assert_eq!(value, "Rossi"),
            other => panic!("expected advance, got {other:?}"),
        }
    }

    #[test]
    fn test_callback_ignores_foreign_namespace_and_bad_index() {
        let step = families();
        let cx = StepContext::default();
        assert_eq!(step.handle_callback("contact:0", &cx), CallbackAction::Ignore);
        assert_eq!(step.handle_callback("family:9", &cx), CallbackAction::Ignore);
        assert_eq!(step.handle_callback("family:x", &cx), CallbackAction::Ignore);
    }
}
