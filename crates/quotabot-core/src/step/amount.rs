//! Euro amount input step.

use super::{Prompt, Step, StepContext};

const PROMPT: &str =
    "💰 Inserisci l'importo in euro (es. 25,50).\n↩️ Rispondi a questo messaggio per continuare.";

/// Largest accepted amount in whole euro. Anything above this is a typo.
const MAX_EURO: i64 = 100_000;

/// Free-text amount entry, parsed to integer euro-cents.
///
/// Accepts both comma and dot as decimal separator, at most two decimals,
/// strictly positive values.
pub struct AmountStep;

impl Step for AmountStep {
    type Value = i64;

    fn present(&self, cx: &StepContext<'_>) -> Prompt {
        Prompt::text(cx.compose(PROMPT))
    }

    fn validate(&self, raw: &str) -> Result<i64, String> {
        let cleaned = raw.trim().trim_start_matches('€').trim().replace(',', ".");
        let (euro_part, cent_part) = match cleaned.split_once('.') {
            Some((euro, cents)) => (euro, cents),
            None => (cleaned.as_str(), ""),
        };

        if euro_part.is_empty() || !euro_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err("Importo non valido. Inserisci un numero positivo (es. 25,50).".to_string());
        }
        if cent_part.len() > 2 || !cent_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err("Importo non valido: al massimo due cifre decimali.".to_string());
        }

        let euro: i64 = euro_part
            .parse()
            .map_err(|_| "Importo non valido. Inserisci un numero positivo (es. 25,50).".to_string())?;
        if euro > MAX_EURO {
            return Err(format!("Importo troppo grande (massimo {MAX_EURO} euro)."));
        }

        let cents: i64 = match cent_part.len() {
            0 => 0,
            1 => cent_part.parse::<i64>().map_err(|_| "Importo non valido.".to_string())? * 10,
            _ => cent_part.parse().map_err(|_| "Importo non valido.".to_string())?,
        };

        let total = euro * 100 + cents;
        if total == 0 {
            return Err("L'importo deve essere positivo.".to_string());
        }
        Ok(total)
    }
}
