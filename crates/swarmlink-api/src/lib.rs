// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The REST process — ingest, query, briefs, compact, routing, messaging.
//!
//! # Design constraints
//!
//! - The surface is local-only and unauthenticated; only the WS bridge
//!   authenticates. Bind stays on loopback unless overridden.
//! - Ingest (`POST /api/actions`) is the hot path: one transaction, no
//!   waiting on fan-out — the NOTIFY is queued inside the transaction and
//!   the response returns at commit.
//! - Every handler checks a pool connection out and releases it at the end
//!   of the request; nothing row-shaped is cached between requests.

pub mod brief;
pub mod error;
pub mod events;
pub mod extract;
pub mod pagination;
pub mod routes;
pub mod state;
pub mod sweeper;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::info;

use swarmlink_config::Config;

use crate::state::AppState;

/// Start the REST server; blocks until the listener fails or the process
/// is shut down.
pub async fn serve(config: Arc<Config>, pool: PgPool) -> anyhow::Result<()> {
    let state = AppState::new(pool, config.clone());

    tokio::spawn(sweeper::run(state.clone()));

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(&config.http.bind)
        .await
        .with_context(|| format!("binding REST listener on {}", config.http.bind))?;
    info!(bind = %config.http.bind, "REST API listening");

    // ConnectInfo feeds the token mint's peer-IP fallback identity.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("REST server terminated")?;
    Ok(())
}
