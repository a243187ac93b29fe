//! # ragdesk CLI (`ragd`)
//!
//! The `ragd` binary indexes documents, answers questions against them, and
//! serves the same operations over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! ragd --config ./config/ragd.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragd init` | Create the SQLite database and run schema migrations |
//! | `ragd ingest <path>...` | Extract, chunk, embed, and index files |
//! | `ragd ask "<query>" --session <id>` | Answer a question from the index |
//! | `ragd history <session>` | Print a session's retained turns |
//! | `ragd clear <session>` | Drop a session's history |
//! | `ragd get <id>` | Print a document and its chunks |
//! | `ragd delete <id>` | Remove a document, its chunks, and vectors |
//! | `ragd book --name <n> --email <e> --date <d> --time <t>` | Book an interview slot |
//! | `ragd bookings` | List bookings, newest first |
//! | `ragd serve` | Start the HTTP server |
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ragdesk::booking::NewBooking;
use ragdesk::{ask, booking, config, db, get, ingest, migrate, server};

/// ragdesk: retrieval-augmented answers over your documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragd.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragd",
    about = "ragdesk: retrieval-augmented answers over your documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent.
    Init,

    /// Index one or more files (`.pdf` or `.txt`).
    Ingest {
        /// Files to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Chunking strategy: `recursive` or `fixed`. Defaults to `[chunking].strategy`.
        #[arg(long)]
        strategy: Option<String>,

        /// Chunk size in characters (50–2000). Defaults to `[chunking].size`.
        #[arg(long)]
        size: Option<usize>,

        /// Overlap between consecutive chunks, below `size`. Defaults to `[chunking].overlap`.
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Answer a question from the indexed documents.
    Ask {
        /// The question.
        query: String,

        /// Session whose history is used and extended.
        #[arg(long, default_value = "cli")]
        session: String,

        /// Number of chunks to retrieve (1–10). Defaults to `[retrieval].top_k`.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Print the retained turns of a session.
    History {
        session: String,
    },

    /// Drop a session's history.
    Clear {
        session: String,
    },

    /// Retrieve a document by its UUID.
    Get {
        id: String,
    },

    /// Remove a document, its chunks, and their vectors.
    Delete {
        id: String,
    },

    /// Book an interview slot.
    Book {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Date as `YYYY-MM-DD`.
        #[arg(long)]
        date: String,

        /// Time as `HH:MM` (24-hour).
        #[arg(long)]
        time: String,
    },

    /// List interview bookings, newest first.
    Bookings,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            paths,
            strategy,
            size,
            overlap,
        } => {
            ingest::run_ingest(&cfg, &paths, strategy, size, overlap).await?;
        }
        Commands::Ask {
            query,
            session,
            top_k,
        } => {
            ask::run_ask(&cfg, &query, &session, top_k).await?;
        }
        Commands::History { session } => {
            ask::run_history(&cfg, &session).await?;
        }
        Commands::Clear { session } => {
            ask::run_clear(&cfg, &session).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Delete { id } => {
            get::run_delete(&cfg, &id).await?;
        }
        Commands::Book {
            name,
            email,
            date,
            time,
        } => {
            let request = NewBooking {
                name,
                email,
                date,
                time,
            };
            booking::run_book(&cfg, &request).await?;
        }
        Commands::Bookings => {
            booking::run_bookings(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
