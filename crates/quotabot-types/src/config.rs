//! Bot configuration.
//!
//! Deserialized from `{data_dir}/config.toml` by the infra loader. Every
//! field has a default so a missing or partial file still yields a usable
//! configuration.

use secrecy::SecretString;
use serde::Deserialize;

/// Top-level bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Transport credential, consumed by the external chat client.
    /// Never logged, never serialized back out.
    #[serde(default)]
    pub bot_token: Option<SecretString>,

    /// When set, only this chat may drive the bot. `None` allows all chats.
    #[serde(default)]
    pub allowed_chat_id: Option<i64>,

    /// Passive session TTL in minutes.
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: u32,

    /// Family names offered by the family selection step.
    #[serde(default = "default_families")]
    pub families: Vec<String>,

    /// Contact handles offered by the paginated contact picker.
    /// Typed handles outside this list are still accepted.
    #[serde(default)]
    pub contacts: Vec<String>,

    /// How many transport deletes the cleanup batch issues concurrently.
    #[serde(default = "default_cleanup_concurrency")]
    pub cleanup_concurrency: usize,

    #[serde(default)]
    pub sheet: SheetConfig,
}

/// Spreadsheet export settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub spreadsheet_id: Option<String>,
}

fn default_session_ttl_minutes() -> u32 {
    120
}

fn default_families() -> Vec<String> {
    ["Rossi", "Bianchi", "Verdi", "Neri", "Blu"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cleanup_concurrency() -> usize {
    4
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_chat_id: None,
            session_ttl_minutes: default_session_ttl_minutes(),
            families: default_families(),
            contacts: Vec::new(),
            cleanup_concurrency: default_cleanup_concurrency(),
            sheet: SheetConfig::default(),
        }
    }
}
