//! # Contracts CLI (`contracts`)
//!
//! ## Usage
//!
//! ```bash
//! contracts --config ./config/contracts.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `contracts init` | Create the SQLite database and schema |
//! | `contracts reset --yes` | Drop and recreate every table |
//! | `contracts sessions list\|new\|show\|rename\|delete` | Manage analysis sessions |
//! | `contracts upload <pdf>` | Extract and index a contract |
//! | `contracts overview` | Contract overview report |
//! | `contracts risks` | Risk and compliance report |
//! | `contracts chat "<question>"` | Ask a question about the contract |
//! | `contracts history` | Print the chat transcript |
//! | `contracts reindex` | Re-chunk and re-embed the contract |
//! | `contracts serve` | Start the HTTP API |
//!
//! Commands that take `--session` fall back to the most recent session when
//! the flag is omitted or names a session that no longer exists. `upload` is
//! the exception: an explicit `--session` must name an existing session.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use contracts_ai::{commands, config, server};

/// Contracts AI: upload a contract PDF, then ask for an overview, a risk
/// scan, or answers grounded in the document.
#[derive(Parser)]
#[command(name = "contracts", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/contracts.toml`. See
    /// `config/contracts.example.toml` for every setting.
    #[arg(long, global = true, default_value = "./config/contracts.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Drop all tables and recreate the schema.
    Reset {
        /// Confirm that all data should be deleted.
        #[arg(long)]
        yes: bool,
    },

    /// Manage analysis sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Upload a contract PDF into a session.
    Upload {
        /// Path to the PDF file.
        path: PathBuf,
        #[arg(long)]
        session: Option<String>,
    },

    /// Show the contract overview, generating it if needed.
    Overview {
        #[arg(long)]
        session: Option<String>,
        /// Generate a new report even if one is stored.
        #[arg(long)]
        regenerate: bool,
    },

    /// Show the risk and compliance report, generating it if needed.
    Risks {
        #[arg(long)]
        session: Option<String>,
        /// Generate a new report even if one is stored.
        #[arg(long)]
        regenerate: bool,
    },

    /// Ask a question about the session's contract.
    Chat {
        question: String,
        #[arg(long)]
        session: Option<String>,
    },

    /// Print the session's chat transcript.
    History {
        #[arg(long)]
        session: Option<String>,
    },

    /// Rebuild the session's chunks and embeddings.
    Reindex {
        #[arg(long)]
        session: Option<String>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum SessionAction {
    /// List sessions, newest first.
    List,
    /// Create an empty session and print its id.
    New {
        #[arg(long)]
        name: Option<String>,
    },
    /// Show a session and its contract metadata.
    Show { id: String },
    /// Rename a session.
    Rename { id: String, name: String },
    /// Delete a session with its contract and chat history.
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Reset { yes } => commands::run_reset(&cfg, yes).await?,
        Commands::Sessions { action } => match action {
            SessionAction::List => commands::run_sessions_list(&cfg).await?,
            SessionAction::New { name } => {
                commands::run_sessions_new(&cfg, name.as_deref()).await?
            }
            SessionAction::Show { id } => commands::run_sessions_show(&cfg, &id).await?,
            SessionAction::Rename { id, name } => {
                commands::run_sessions_rename(&cfg, &id, &name).await?
            }
            SessionAction::Delete { id } => commands::run_sessions_delete(&cfg, &id).await?,
        },
        Commands::Upload { path, session } => {
            commands::run_upload(&cfg, &path, session.as_deref()).await?
        }
        Commands::Overview {
            session,
            regenerate,
        } => commands::run_overview(&cfg, session.as_deref(), regenerate).await?,
        Commands::Risks {
            session,
            regenerate,
        } => commands::run_risks(&cfg, session.as_deref(), regenerate).await?,
        Commands::Chat { question, session } => {
            commands::run_chat(&cfg, &question, session.as_deref()).await?
        }
        Commands::History { session } => {
            commands::run_history(&cfg, session.as_deref()).await?
        }
        Commands::Reindex { session } => {
            commands::run_reindex(&cfg, session.as_deref()).await?
        }
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}
