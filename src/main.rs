//! CLI entry point for subsplease-dl.

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, warn};

mod app;
mod cli;

use app::report::ProcessExit;
use cli::Args;

fn init_tracing(args: &Args) {
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(&args);
    debug!(?args, "CLI arguments parsed");

    let outcome = tokio::select! {
        result = app::run(args) => match result {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("error: {e:#}");
                ProcessExit::Failure
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, partial files are kept for resuming");
            ProcessExit::Interrupted
        }
    };

    // Exit codes never exceed 255.
    ExitCode::from(u8::try_from(outcome.code()).unwrap_or(1))
}
