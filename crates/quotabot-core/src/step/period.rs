//! Billing period input step.

use quotabot_types::transaction::Period;

use super::{Prompt, Step, StepContext};

const PROMPT: &str =
    "📅 Inserisci il periodo (formato MM-YYYY, es. 01-2026).\n↩️ Rispondi a questo messaggio per continuare.";

const INVALID: &str = "Formato periodo non valido. Usa MM-YYYY (es. 01-2026).";

/// Free-text period entry, parsed to a month/year pair.
pub struct PeriodStep;

impl Step for PeriodStep {
    type Value = Period;

    fn present(&self, cx: &StepContext<'_>) -> Prompt {
        Prompt::text(cx.compose(PROMPT))
    }

    fn validate(&self, raw: &str) -> Result<Period, String> {
        raw.trim().parse().map_err(|_| INVALID.to_string())
    }
}
