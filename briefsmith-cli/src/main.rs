//! Briefsmith CLI: command-line driver for the briefing synthesis pipeline.
//!
//! Builds a request from flags, runs the pipeline, and writes the finished
//! document record as JSON.

mod commands;
mod progress;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Briefsmith: research-grounded delegation briefings from a handful of event facts
#[derive(Parser, Debug)]
#[command(name = "briefsmith", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.briefsmith/config.toml`)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Model to use for every generation call
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Synthesize a briefing and write it as JSON
    Generate(GenerateArgs),
    /// Inspect the static knowledge overlay
    Overlay {
        #[command(subcommand)]
        action: OverlayAction,
    },
    /// Recover a JSON object from a file of raw model output
    Repair {
        /// File holding the raw output
        file: PathBuf,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Event name
    #[arg(long)]
    event: String,
    /// Host city
    #[arg(long)]
    city: String,
    /// Host country
    #[arg(long)]
    country: String,
    /// First day (YYYY-MM-DD)
    #[arg(long)]
    start: String,
    /// Last day (YYYY-MM-DD); defaults to the first day
    #[arg(long)]
    end: Option<String>,
    #[arg(long)]
    venue: Option<String>,
    #[arg(long)]
    event_type: Option<String>,
    /// Free-text context passed to research and generation
    #[arg(long)]
    context: Option<String>,
    /// Official event website
    #[arg(long)]
    website: Option<String>,
    /// Output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,
    /// Also write the run report (stages, queries, normalization) next to the record
    #[arg(long)]
    report: bool,
    /// Language for narrative fields
    #[arg(long)]
    language: Option<String>,
    /// Dispatch research queries and sections concurrently
    #[arg(long)]
    parallel: bool,
}

#[derive(clap::Subcommand, Debug)]
enum OverlayAction {
    /// Print the overlay block and override values for an event
    Show {
        /// Event name to look up
        event: String,
        /// Host country
        #[arg(long)]
        country: Option<String>,
        /// Host city
        #[arg(long)]
        city: Option<String>,
        /// First day (YYYY-MM-DD); defaults to today
        #[arg(long)]
        start: Option<String>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the merged configuration as TOML
    Show,
    /// Print the configuration file locations
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "briefsmith", "briefsmith")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "briefsmith.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.model.as_deref(), cli.quiet).await
}
