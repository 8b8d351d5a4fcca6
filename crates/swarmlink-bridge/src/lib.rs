// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The real-time event bridge.
//!
//! A single process holding one LISTEN subscription and N WebSocket
//! clients. Independently scheduled loops:
//!
//! - the notification listener ([`listener`]), reconnecting with backoff
//! - one read loop + one serialized write loop per client ([`client`])
//! - the heartbeat loop ([`heartbeat`]): ping every 30 s, evict at 60 s
//! - the retry sweeper ([`retry`]): at-least-once for critical events
//! - the metrics aggregator ([`metrics`]): one `metric.update` per 5 s
//!
//! All shared state lives in the [`registry::Registry`].

pub mod client;
pub mod heartbeat;
pub mod listener;
pub mod metrics;
pub mod registry;
pub mod retry;

use std::sync::Arc;

use anyhow::Context;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use swarmlink_config::Config;

use crate::registry::Registry;

/// Everything the per-connection and periodic loops share.
pub struct BridgeContext {
    pub registry: Registry,
    pub secret: Option<Vec<u8>>,
    pub dev_mode: bool,
}

/// Start the bridge; blocks until the listener socket fails.
pub async fn serve(config: Arc<Config>, pool: PgPool) -> anyhow::Result<()> {
    let secret = config.auth.secret.as_deref().map(|s| s.as_bytes().to_vec());
    if secret.is_none() && !config.dev_mode {
        anyhow::bail!("no WS auth secret configured and dev mode is off — refusing to start");
    }

    let ctx = Arc::new(BridgeContext {
        registry: Registry::new(),
        secret,
        dev_mode: config.dev_mode,
    });

    tokio::spawn(listener::run(pool.clone(), ctx.clone()));
    tokio::spawn(heartbeat::run(ctx.clone()));
    tokio::spawn(retry::run(ctx.clone()));
    tokio::spawn(metrics::run(pool.clone(), ctx.clone()));

    let app = Router::new().route("/ws", get(upgrade)).with_state(ctx);
    let listener = tokio::net::TcpListener::bind(&config.ws.bind)
        .await
        .with_context(|| format!("binding bridge listener on {}", config.ws.bind))?;
    info!(bind = %config.ws.bind, dev_mode = config.dev_mode, "bridge listening");

    axum::serve(listener, app)
        .await
        .context("bridge server terminated")?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ConnectQuery {
    #[serde(default)]
    token: Option<String>,
}

async fn upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<BridgeContext>>,
    Query(query): Query<ConnectQuery>,
) -> Response {
    ws.on_upgrade(move |socket| client::handle_socket(socket, ctx, query.token))
}
