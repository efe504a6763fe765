//! `vidgen` -- command-line client for asynchronous video generation.
//!
//! Quotes, submits and polls jobs against the configured service, saving
//! the finished video to disk. Ctrl-C cancels a wait without touching the
//! remote job, which can be picked up later with `vidgen resume`.
//!
//! # Environment variables
//!
//! | Variable                      | Required | Default                   | Description                       |
//! |-------------------------------|----------|---------------------------|-----------------------------------|
//! | `VIDGEN_API_KEY`              | yes      | --                        | Bearer token for the service      |
//! | `VIDGEN_BASE_URL`             | no       | `https://api.example.com` | Service base URL                  |
//! | `VIDGEN_POLL_INTERVAL_SECS`   | no       | `10`                      | Seconds between status polls      |
//! | `VIDGEN_RUN_TIMEOUT_SECS`     | no       | `900`                     | Wall-clock budget for a wait      |
//! | `VIDGEN_CATALOG_PATH`         | no       | --                        | JSON catalog of served models     |
//! | `VIDGEN_LOG_JSON`             | no       | `0`                       | `1` for JSON log lines            |
//!
//! See `ClientConfig::from_env` for the retry settings.

mod commands;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidgen_client::config::ClientConfig;
use vidgen_client::CancellationToken;

use crate::commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let config = ClientConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "Loaded configuration");
    let orchestrator = config
        .build_orchestrator()
        .context("failed to initialise the client")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    commands::execute(cli.command, &orchestrator, &config.run, &cancel).await
}

/// Log to stderr so stdout carries only command output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vidgen=info,vidgen_client=info".into());
    let json = std::env::var("VIDGEN_LOG_JSON")
        .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
