// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

/// Observability and coordination backbone for multi-agent coding sessions.
#[derive(Parser, Debug)]
#[command(name = "swarmlink", version, about)]
pub struct Cli {
    /// Path to the config file (overrides the default search paths).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log to stderr at debug level (or honor RUST_LOG when set).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the REST API process (ingest, queries, briefs, token mint).
    ///
    /// Hook clients post lifecycle events here; the dashboard reads from
    /// here. Binds loopback:3847 by default.
    Api,

    /// Start the WebSocket bridge process (real-time fan-out).
    ///
    /// Holds the LISTEN subscription and pushes committed events to
    /// authenticated monitoring clients. Binds loopback:3849 by default.
    Bridge,

    /// Apply pending database migrations and exit.
    Migrate,

    /// Print the effective configuration (after merging all layers) and exit.
    ShowConfig,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
