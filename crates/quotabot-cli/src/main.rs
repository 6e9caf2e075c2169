//! quotabot maintenance CLI.
//!
//! Binary name: `quotabot`
//!
//! The conversational engine itself is driven by the transport entrypoint;
//! this binary covers the operational chores around it: sweeping expired
//! session rows, inspecting registered transactions, and showing the
//! effective configuration.

mod state;

use clap::{Parser, Subcommand};
use comfy_table::Table;

use quotabot_core::repository::{SessionStore, TransactionStore};
use quotabot_types::transaction::format_cents;

use state::AppState;

/// Treasury bot maintenance tools.
#[derive(Parser)]
#[command(name = "quotabot", version, about, long_about = None)]
struct Cli {
    /// Export spans via OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Physically remove expired session rows.
    Sweep,

    /// List the most recently registered transactions.
    #[command(alias = "ls")]
    Recent {
        /// Maximum number of rows to show.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Show the effective configuration.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    quotabot_observe::tracing_setup::init_tracing(cli.otel)
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    let state = AppState::init().await?;

    match cli.command {
        Commands::Sweep => {
            let removed = state.sessions.sweep_expired().await?;
            println!("Removed {removed} expired session(s).");
        }

        Commands::Recent { limit } => {
            let transactions = state.transactions.list_recent(limit).await?;
            if transactions.is_empty() {
                println!("No transactions registered yet.");
            } else {
                let mut table = Table::new();
                table.set_header(vec![
                    "Data", "Famiglia", "Categoria", "Importo", "Periodo", "Contatto",
                ]);
                for tx in &transactions {
                    table.add_row(vec![
                        tx.created_at.format("%Y-%m-%d %H:%M").to_string(),
                        tx.family.clone(),
                        tx.category.clone(),
                        format!("€{}", format_cents(tx.amount_cents)),
                        tx.period().to_string(),
                        tx.contact.clone(),
                    ]);
                }
                println!("{table}");
            }
        }

        Commands::Status => {
            let config = &state.config;
            println!("Data directory:  {}", state.data_dir.display());
            match config.allowed_chat_id {
                Some(chat_id) => println!("Allowed chat:    {chat_id}"),
                None => println!("Allowed chat:    (any)"),
            }
            println!("Session TTL:     {} min", config.session_ttl_minutes);
            println!("Families:        {}", config.families.join(", "));
            println!("Contacts:        {} configured", config.contacts.len());
            println!(
                "Sheet sync:      {}",
                if config.sheet.enabled { "enabled" } else { "disabled" }
            );
        }
    }

    quotabot_observe::tracing_setup::shutdown_tracing();
    Ok(())
}
