// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Completions { shell } => {
            cli::print_completions(*shell);
            return Ok(());
        }
        Commands::ShowConfig => {
            let config = swarmlink_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            return Ok(());
        }
        _ => {}
    }

    let config = Arc::new(swarmlink_config::load(cli.config.as_deref())?);
    let pool = swarmlink_store::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.max_retries,
    )
    .await
    .with_context(|| format!("connecting to {}", redact_url(&config.database.url)))?;

    match cli.command {
        Commands::Api => {
            swarmlink_store::migrate(&pool)
                .await
                .context("running migrations")?;
            swarmlink_api::serve(config, pool).await
        }
        Commands::Bridge => swarmlink_bridge::serve(config, pool).await,
        Commands::Migrate => {
            swarmlink_store::migrate(&pool)
                .await
                .context("running migrations")?;
            println!("migrations applied");
            Ok(())
        }
        Commands::ShowConfig | Commands::Completions { .. } => unreachable!(),
    }
}

fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug,sqlx=info,hyper=info")
    } else {
        EnvFilter::new("info,sqlx=warn")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Strip credentials from a connection URL before it reaches a log line.
fn redact_url(url: &str) -> String {
    match url.split_once('@') {
        Some((_, host)) => format!("postgres://…@{host}"),
        None => url.to_string(),
    }
}
