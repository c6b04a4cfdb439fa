//! Quill CLI: terminal interface for grounded question answering.
//!
//! Provides one-shot `ask`, index loading, configuration inspection and an
//! interactive question loop.

mod commands;
mod output;
mod repl;

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Quill: answers with citations from your own knowledge base
#[derive(Parser, Debug)]
#[command(name = "quill", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.quill/`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand (starts the interactive loop if omitted)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Answer one question and exit
    Ask {
        /// The question
        question: String,

        /// Number of chunks handed to the model
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Semantic similarity floor (0.0-1.0)
        #[arg(long)]
        min_similarity: Option<f32>,

        /// Skip keyword search and fusion
        #[arg(long)]
        semantic_only: bool,

        /// Only use chunks with this source_type
        #[arg(long)]
        source_type: Option<String>,

        /// Only use chunks tagged with this topic
        #[arg(long)]
        topic: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load pre-chunked JSON Lines records into the index
    Index {
        /// File with one {"chunk_id", "text", "metadata"} object per line
        path: PathBuf,

        /// Chunks embedded per batch
        #[arg(long, default_value = "32")]
        batch_size: usize,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the merged configuration
    Show,
    /// List configuration files and index locations
    Path,
}

/// Canonical workspace path. A path that does not exist is an error rather
/// than a silent fallback, so `.quill/` is never created in the wrong place.
fn resolve_workspace(path: &Path) -> anyhow::Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("Workspace directory {} is not accessible", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr. RUST_LOG wins over -v when set.
    let stderr_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "quill", "quill")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "quill.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("quill_core=debug,quill=debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = resolve_workspace(&cli.workspace)?;

    match cli.command {
        Some(command) => commands::handle_command(command, &workspace).await,
        None => repl::run_interactive(&workspace).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_workspace_is_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_workspace(dir.path()).unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_missing_workspace_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("typo");
        let err = resolve_workspace(&missing).unwrap_err();
        assert!(err.to_string().contains("typo"));
        assert!(!missing.exists());
    }
}
