//! # smartdoc CLI
//!
//! Front end for the document ingestion pipeline.
//!
//! ## Usage
//!
//! ```bash
//! smartdoc --config ./config/smartdoc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `smartdoc init` | Create the SQLite database and upload directory |
//! | `smartdoc formats` | List extractors and the extensions they claim |
//! | `smartdoc upload <file>` | Store a file and process it |
//! | `smartdoc process <id>` | (Re)run extraction, chunking and embedding |
//! | `smartdoc list` | List documents, oldest first |
//! | `smartdoc get <id>` | Show a document, optionally with chunks |
//! | `smartdoc delete <id>` | Remove the file, chunks and record |
//! | `smartdoc similar "<query>"` | Rank completed documents by cosine similarity |
//! | `smartdoc context <id>...` | Print the prompt context block for documents |
//!
//! Logs go to stderr; set `RUST_LOG` to change the level.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smartdoc::{commands, config};

/// smartdoc: extract, chunk and embed uploaded documents.
///
/// All commands except `formats` read a TOML configuration file given by
/// `--config`. See `config/smartdoc.example.toml`.
#[derive(Parser)]
#[command(name = "smartdoc", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/smartdoc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and upload directory.
    ///
    /// Idempotent; running it again is safe.
    Init,

    /// List extractors and the extensions they claim, in resolution order.
    Formats,

    /// Copy a file into the upload directory and record it.
    ///
    /// The file is processed immediately unless `--no-process` is given.
    Upload {
        /// File to upload.
        file: PathBuf,

        /// Name to record instead of the file's own name.
        #[arg(long)]
        name: Option<String>,

        /// MIME type reported by the client.
        #[arg(long)]
        mime: Option<String>,

        /// Only store the file; leave the document `uploaded`.
        #[arg(long)]
        no_process: bool,
    },

    /// Extract, chunk and embed a stored document.
    Process {
        /// Document UUID.
        id: String,
    },

    /// List documents, oldest first.
    List {
        #[arg(long, default_value_t = 0)]
        skip: usize,

        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Show one document.
    Get {
        /// Document UUID.
        id: String,

        /// Also print every chunk.
        #[arg(long)]
        chunks: bool,
    },

    /// Delete a document, its chunks and its stored file.
    Delete {
        /// Document UUID.
        id: String,
    },

    /// Rank completed documents by similarity to a query.
    Similar {
        query: String,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Print the prompt context block for the given documents.
    Context {
        /// Document UUIDs, in output order.
        #[arg(required = true)]
        ids: Vec<String>,

        /// Characters of text taken from each document.
        #[arg(long, default_value_t = smartdoc::context::DEFAULT_MAX_CHARS)]
        max_chars: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartdoc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Formats runs without a config file, but a present one must be valid
    if let Commands::Formats = cli.command {
        let cfg = if cli.config.exists() {
            config::load_config(&cli.config)?
        } else {
            config::parse_config("[db]\npath = \"./data/smartdoc.sqlite\"\n")?
        };
        return commands::run_formats(&cfg);
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            commands::run_init(&cfg).await?;
        }
        Commands::Formats => {}
        Commands::Upload {
            file,
            name,
            mime,
            no_process,
        } => {
            commands::run_upload(&cfg, &file, name.as_deref(), mime, !no_process).await?;
        }
        Commands::Process { id } => {
            commands::run_process(&cfg, &id).await?;
        }
        Commands::List { skip, limit } => {
            commands::run_list(&cfg, skip, limit).await?;
        }
        Commands::Get { id, chunks } => {
            commands::run_get(&cfg, &id, chunks).await?;
        }
        Commands::Delete { id } => {
            commands::run_delete(&cfg, &id).await?;
        }
        Commands::Similar { query, limit } => {
            commands::run_similar(&cfg, &query, limit).await?;
        }
        Commands::Context { ids, max_chars } => {
            commands::run_context(&cfg, &ids, max_chars).await?;
        }
    }

    Ok(())
}
