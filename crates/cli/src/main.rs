//! Wayfarer CLI — the main entry point.
//!
//! Commands:
//! - `onboard`     — Initialize config, data and skill directories
//! - `generate`    — Run one ideation cycle and print the draft
//! - `regenerate`  — Replace a pending draft with a fresh one
//! - `approve`     — Turn approved ideas into full notes
//! - `learn`       — Learn reusable rules from a viral script
//! - `win`         — Record a manually reported win
//! - `audit`       — Summarize what the knowledge store has learned
//! - `skills`      — Show the assembled skill context
//! - `status`      — Show configuration and today's quota

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "wayfarer",
    about = "Wayfarer — validated travel-post ideation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration, data and skill directories
    Onboard,

    /// Generate, score and validate a batch of post ideas
    Generate {
        /// Anchor the batch to two regions (pass exactly twice)
        #[arg(short, long = "region", num_args = 1)]
        regions: Vec<String>,
    },

    /// Replace a draft with a freshly generated one
    Regenerate {
        /// content_id of the draft to replace
        content_id: String,
    },

    /// Approve ideas of a draft and generate their notes
    Approve {
        /// content_id printed by `generate`
        content_id: String,
        /// 1, 2 or both
        choice: String,
    },

    /// Learn reusable rules from a viral script
    Learn {
        /// Read the script from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(short, long = "meta", value_name = "KEY=VALUE", help = commands::learn::meta_help())]
        meta: Vec<String>,
    },

    /// Record a manually reported win: hook on the first line, body after
    Win {
        /// Hook and optional body
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Summarize what the knowledge store has learned
    Audit,

    /// Show which skill documents the next prompt will carry
    Skills,

    /// Show configuration and today's quota
    Status,

    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Generate { regions } => commands::generate::run(regions).await?,
        Commands::Regenerate { content_id } => commands::generate::regenerate(&content_id).await?,
        Commands::Approve { content_id, choice } => {
            commands::approve::run(&content_id, &choice).await?
        }
        Commands::Learn { file, meta } => commands::learn::run(file, meta).await?,
        Commands::Win { text } => commands::learn::win(&text).await?,
        Commands::Audit => commands::audit::run().await?,
        Commands::Skills => commands::audit::skills().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "wayfarer", &mut std::io::stdout());
        }
    }

    Ok(())
}
