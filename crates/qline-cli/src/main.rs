//! qline CLI
//!
//! Command-line interface for qline - shared waiting lines.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use qline_core::{Config, CredentialStore, FileCredentialStore, QueueSession, ReqwestTransport};

mod commands;
mod output;
mod tui;

use output::{Output, OutputFormat};

/// Session type used by every command
pub type Session = QueueSession<ReqwestTransport>;

#[derive(Parser)]
#[command(name = "qline")]
#[command(about = "qline - Shared waiting lines from the terminal")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Live view of all queues (default)
    Watch {
        /// Queue to open on start
        queue_id: Option<String>,
    },
    /// List all queues
    #[command(alias = "ls")]
    Queues,
    /// Show the members of a queue
    Show {
        queue_id: String,
    },
    /// Create a queue
    Create {
        /// Queue name
        name: String,
    },
    /// Join a queue
    Join {
        queue_id: String,
    },
    /// Leave a queue
    Leave {
        queue_id: String,
    },
    /// Let the next person go first
    Skip {
        queue_id: String,
    },
    /// Ask another member to trade places
    Swap {
        queue_id: String,
        /// Entry to swap with
        entry_id: String,
    },
    /// Show the authenticated user
    Whoami,
    /// Show connection and membership status
    Status,
    /// Store a bearer token
    Login {
        /// Token issued by the server
        #[arg(long)]
        token: String,
    },
    /// Forget the stored token
    Logout,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (base_url, data_dir, log_file, reconnect_initial_secs,
        /// reconnect_max_secs, utc_offset_minutes)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands don't need a session
    if let Some(Commands::Config { command }) = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, &output)
            }
        };
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(config.token_path()));

    // The live view logs to a file; everything else to stderr
    let command = match cli.command.unwrap_or(Commands::Watch { queue_id: None }) {
        Commands::Watch { queue_id } => return tui::run(config, credentials, queue_id).await,
        command => command,
    };
    init_logging();

    let session = Session::from_config(&config, ReqwestTransport::new(), credentials.clone());

    match command {
        Commands::Watch { .. } | Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Queues => commands::queue::list(&session, &output).await,
        Commands::Show { queue_id } => {
            commands::queue::show(&session, &config, queue_id, &output).await
        }
        Commands::Create { name } => commands::queue::create(&session, name, &output).await,
        Commands::Join { queue_id } => commands::queue::join(&session, queue_id, &output).await,
        Commands::Leave { queue_id } => commands::queue::leave(&session, queue_id, &output).await,
        Commands::Skip { queue_id } => commands::queue::skip(&session, queue_id, &output).await,
        Commands::Swap { queue_id, entry_id } => {
            commands::queue::swap(&session, queue_id, entry_id, &output).await
        }
        Commands::Whoami => commands::auth::whoami(&session, &output).await,
        Commands::Status => commands::status::show(&session, &config, &output).await,
        Commands::Login { token } => {
            commands::auth::login(&config, credentials.as_ref(), token, &output).await
        }
        Commands::Logout => commands::auth::logout(credentials.as_ref(), &output),
    }
}

/// Stderr logging for one-shot commands, level from QLINE_LOG (default warn)
fn init_logging() {
    let level = std::env::var("QLINE_LOG").unwrap_or_else(|_| "warn".to_string());
    let env_filter = EnvFilter::try_new(format!("qline_core={},qline_cli={}", level, level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
