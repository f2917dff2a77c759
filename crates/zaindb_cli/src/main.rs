//! ZainDB CLI
//!
//! Command-line message board and log viewer.
//!
//! # Commands
//!
//! - `messages` - Add, list, search, edit and delete board messages
//! - `logs` - List, delete and clear log entries
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::Format;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use zaindb_board::DEFAULT_LOG_VERSION;

/// ZainDB message board tools.
#[derive(Parser)]
#[command(name = "zaindb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the database journals
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value = "text")]
    format: Format,

    /// Version stamped on new log entries
    #[arg(global = true, long, default_value = DEFAULT_LOG_VERSION)]
    log_version: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage board messages
    Messages {
        #[command(subcommand)]
        action: MessageCommand,
    },

    /// Manage log entries
    Logs {
        #[command(subcommand)]
        action: LogCommand,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum MessageCommand {
    /// Add placeholder messages
    Add {
        /// Number of messages to add
        #[arg(short, long, default_value = "1")]
        count: usize,
    },

    /// List every message
    List,

    /// Search messages; the first given criterion wins
    Search {
        /// Author name
        #[arg(long)]
        name: Option<String>,

        /// Contact mail
        #[arg(long)]
        mail: Option<String>,

        /// Message body
        #[arg(long)]
        content: Option<String>,

        /// Creation time as stored
        #[arg(long)]
        time: Option<String>,

        /// Id or interval, e.g. 5, "[3, 7)", "(3, ~]"
        #[arg(long)]
        id: Option<String>,
    },

    /// Edit a message
    Edit {
        /// Message id
        id: i64,

        /// New author name
        #[arg(long)]
        name: Option<String>,

        /// New contact mail
        #[arg(long)]
        mail: Option<String>,

        /// New message body
        #[arg(long)]
        content: Option<String>,
    },

    /// Delete a message
    Delete {
        /// Message id
        id: i64,
    },

    /// Delete every message
    Clear,
}

#[derive(Subcommand)]
enum LogCommand {
    /// List every log entry
    List,

    /// Delete a log entry
    Delete {
        /// Entry id
        id: i64,
    },

    /// Delete every log entry
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let action = match cli.command {
        Commands::Version => {
            println!("ZainDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ZainDB Core v{}", zaindb_core::VERSION);
            return Ok(());
        }
        command => command,
    };

    let path = cli.path.ok_or("Database path required")?;
    let app = commands::open(&path, &cli.log_version).await?;
    let format = cli.format;

    match action {
        Commands::Messages { action } => match action {
            MessageCommand::Add { count } => commands::messages::add(&app, count, format).await?,
            MessageCommand::List => commands::messages::list(&app, format).await?,
            MessageCommand::Search {
                name,
                mail,
                content,
                time,
                id,
            } => {
                let filter = commands::messages::filter(name, mail, content, time, id.as_deref())?;
                commands::messages::search(&app, &filter, format).await?;
            }
            MessageCommand::Edit {
                id,
                name,
                mail,
                content,
            } => commands::messages::edit(&app, id, name, mail, content, format).await?,
            MessageCommand::Delete { id } => commands::messages::delete(&app, id).await?,
            MessageCommand::Clear => commands::messages::clear(&app).await?,
        },
        Commands::Logs { action } => match action {
            LogCommand::List => commands::logs::list(&app, format).await?,
            LogCommand::Delete { id } => commands::logs::delete(&app, id).await?,
            LogCommand::Clear => commands::logs::clear(&app).await?,
        },
        Commands::Version => {}
    }

    // Engine events are logged in the background; flush them before exit.
    app.logs().settled().await;
    Ok(())
}
