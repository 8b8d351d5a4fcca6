// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Router assembly. `/health` and the two `/stats` endpoints are
//! unprefixed; everything else lives under `/api`.

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use swarmlink_proto::Notification;

use crate::state::AppState;

pub mod actions;
pub mod auth;
pub mod blocking;
pub mod compact;
pub mod contexts;
pub mod messages;
pub mod projects;
pub mod requests;
pub mod routing;
pub mod sessions;
pub mod stats;
pub mod subscriptions;
pub mod subtasks;
pub mod tasks;

pub fn router(state: AppState) -> Router {
    let max_body = state.config.http.max_body_bytes;

    let api = Router::new()
        .merge(projects::router())
        .merge(sessions::router())
        .merge(requests::router())
        .merge(tasks::router())
        .merge(subtasks::router())
        .merge(actions::router())
        .merge(routing::router())
        .merge(compact::router())
        .merge(contexts::router())
        .merge(messages::router())
        .merge(subscriptions::router())
        .merge(blocking::router())
        .merge(auth::router())
        .merge(stats::api_router());

    Router::new()
        .route("/health", get(stats::health))
        .route("/stats", get(stats::overview))
        .route("/stats/tools-summary", get(stats::tools_summary))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(max_body))
        .with_state(state)
}

/// Emit notifications after a committed single-statement write. The write
/// has already happened, so emission failures are logged, not surfaced.
pub(crate) async fn emit_all(pool: &sqlx::PgPool, notifications: &[Notification]) {
    for n in notifications {
        if let Err(e) = swarmlink_store::notify::emit(pool, n).await {
            warn!(event = %n.event, "notification emission failed: {e}");
        }
    }
}
