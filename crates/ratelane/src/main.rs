// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ratelane - rate-limited LLM prompt dispatch.
//!
//! This is the binary entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ratelane::runtime::{self, Runtime};
use ratelane::shutdown;
use ratelane_config::RatelaneConfig;

/// Ratelane - rate-limited LLM prompt dispatch with batch aggregation.
#[derive(Parser, Debug)]
#[command(name = "ratelane", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the API server, worker pool, aggregator and sweeper.
    Serve,
    /// Run the worker pool, aggregator and sweeper without the API.
    Worker,
    /// Validate configuration and print the effective settings.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => ratelane_config::load_and_validate_path(path),
        None => ratelane_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            ratelane_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => run(config, true).await,
        Some(Commands::Worker) => run(config, false).await,
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("ratelane: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("ratelane: {e}");
        std::process::exit(1);
    }
}

async fn run(config: RatelaneConfig, with_api: bool) -> Result<(), ratelane_core::RatelaneError> {
    runtime::init_tracing(&config.logging);
    let prometheus_render = runtime::install_metrics(config.server.metrics_enabled);
    let cancel = shutdown::install_signal_handler();

    let runtime = Runtime::build(config).await?;
    runtime.run(with_api, prometheus_render, cancel).await
}

/// Print the effective configuration as TOML with secrets masked.
fn print_config(config: &RatelaneConfig) -> Result<(), ratelane_core::RatelaneError> {
    println!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &RatelaneConfig) -> Result<String, ratelane_core::RatelaneError> {
    let mut shown = config.clone();
    if shown.server.bearer_token.is_some() {
        shown.server.bearer_token = Some("[redacted]".to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| ratelane_core::RatelaneError::Config(format!("failed to render config: {e}")))
}
