use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};

use docgraph::core::config::log_level_from_env;
use docgraph::{process_file, AppError, AppResult, PipelineConfig};

// ── CLI ─────────────────────────────────────────────────────────────

/// Structure a PDF, PPTX or text document into a content graph with chunks and topics.
#[derive(Parser, Debug)]
#[command(name = "docgraph", version, about)]
struct Cli {
    /// Document to process.
    path: PathBuf,

    /// Media type; guessed from the extension when omitted.
    #[arg(long)]
    mime: Option<String>,

    /// Display name recorded as the original file name.
    #[arg(long)]
    name: Option<String>,

    /// JSON pipeline config. Without it, defaults plus DOCGRAPH_* overrides apply.
    #[arg(long, env = "DOCGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,

    /// Print only the chunks.
    #[arg(long, conflicts_with = "topics_only")]
    chunks_only: bool,

    /// Print only the topics.
    #[arg(long)]
    topics_only: bool,
}

// ── main ────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level_from_env())),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(code = err.code(), error = %err, "processing failed");
            let body = serde_json::to_string(&err)
                .unwrap_or_else(|_| format!(r#"{{"code":"{}"}}"#, err.code()));
            println!("{body}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> AppResult<String> {
    let config = match &cli.config {
        Some(path) => {
            let config = PipelineConfig::from_json_file(path)?;
            info!(path = %path.display(), "loaded pipeline config");
            config
        }
        None => PipelineConfig::from_env(),
    };

    let processed = process_file(&cli.path, cli.mime.as_deref(), cli.name.as_deref(), &config)?;
    if cli.chunks_only {
        render(&processed.chunks, cli.pretty)
    } else if cli.topics_only {
        render(&processed.topics, cli.pretty)
    } else {
        render(&processed, cli.pretty)
    }
}

fn render<T: Serialize>(value: &T, pretty: bool) -> AppResult<String> {
    let out = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    out.map_err(AppError::from)
}
