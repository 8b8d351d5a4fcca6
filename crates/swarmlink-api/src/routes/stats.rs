// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Health, stats, dashboard KPIs, the hierarchy tree, active sessions,
//! and cleanup statistics.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use swarmlink_store::queries::{sessions, stats};

use crate::error::ApiError;
use crate::state::AppState;

/// Endpoints living under `/api`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/dashboard/kpis", get(kpis))
        .route("/hierarchy/:project_id", get(hierarchy))
        .route("/active-sessions", get(active_sessions))
        .route("/cleanup/stats", get(cleanup_stats))
}

/// `GET /health` — unprefixed. The API keeps serving local endpoints when
/// the database is down, but reports 503 here so orchestration notices.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let probe = tokio::time::timeout(
        Duration::from_secs(1),
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.pool),
    )
    .await;

    match probe {
        Ok(Ok(_)) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "ok" })),
        ),
        Ok(Err(e)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": e.to_string() })),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "health probe timed out" })),
        ),
    }
}

/// `GET /stats` — unprefixed. Global counts plus the busiest projects.
pub async fn overview(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let totals = stats::overview(&state.pool).await?;
    let projects = stats::per_project(&state.pool, 20).await?;
    Ok(Json(json!({
        "totals": totals,
        "projects": projects,
    })))
}

/// `GET /stats/tools-summary` — unprefixed.
pub async fn tools_summary(
    State(state): State<AppState>,
) -> Result<Json<Vec<stats::ToolSummary>>, ApiError> {
    Ok(Json(stats::tools_summary(&state.pool).await?))
}

async fn kpis(State(state): State<AppState>) -> Result<Json<stats::DashboardKpis>, ApiError> {
    Ok(Json(stats::dashboard_kpis(&state.pool).await?))
}

async fn hierarchy(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(stats::hierarchy(&state.pool, project_id).await?))
}

async fn active_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<sessions::ActiveSession>>, ApiError> {
    Ok(Json(sessions::active(&state.pool, 100).await?))
}

async fn cleanup_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.cleanup.read().await.clone();
    Json(json!({
        "runs": stats.runs,
        "expired_deleted": stats.expired_deleted,
        "read_deleted": stats.read_deleted,
        "ran_at": stats.ran_at,
    }))
}
