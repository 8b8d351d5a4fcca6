// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Agent context endpoints: brief generation, live context rows, stats.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use swarmlink_store::models::AgentContext;
use swarmlink_store::queries::contexts;

use crate::brief::{self, Brief, BriefRequest};
use crate::error::{ApiError, FieldErrors};
use crate::events;
use crate::extract::Body;
use crate::pagination::{Page, Pagination};
use crate::routes::emit_all;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/context/generate", post(generate))
        .route("/context/:agent_id", get(for_agent))
        .route("/agent-contexts", get(list).post(upsert))
        .route("/agent-contexts/stats", get(stats))
}

async fn generate(
    State(state): State<AppState>,
    Body(req): Body<BriefRequest>,
) -> Result<Json<Brief>, ApiError> {
    let mut errors = FieldErrors::new();
    errors.require("session_id", !req.session_id.is_empty());
    errors.require("agent_id", !req.agent_id.is_empty());
    errors.check()?;

    let inputs = brief::load_inputs(&state.pool, &req).await?;
    Ok(Json(brief::generate(&req, &inputs, Utc::now())))
}

async fn for_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<Vec<AgentContext>>, ApiError> {
    Ok(Json(contexts::for_agent(&state.pool, &agent_id).await?))
}

#[derive(Debug, Deserialize)]
struct UpsertContext {
    project_id: Option<Uuid>,
    agent_id: Option<String>,
    agent_type: Option<String>,
    #[serde(default = "empty_object")]
    role_context: serde_json::Value,
    #[serde(default)]
    skills_to_restore: Vec<String>,
    #[serde(default)]
    tools_used: Vec<String>,
    #[serde(default)]
    progress_summary: Option<String>,
}

fn empty_object() -> serde_json::Value {
    json!({})
}

async fn upsert(
    State(state): State<AppState>,
    Body(body): Body<UpsertContext>,
) -> Result<(StatusCode, Json<AgentContext>), ApiError> {
    let mut errors = FieldErrors::new();
    errors.require("project_id", body.project_id.is_some());
    errors.require(
        "agent_id",
        body.agent_id.as_deref().is_some_and(|a| !a.is_empty()),
    );
    errors.require(
        "agent_type",
        body.agent_type.as_deref().is_some_and(|a| !a.is_empty()),
    );
    errors.check()?;

    let context = contexts::upsert(
        &state.pool,
        body.project_id.unwrap_or_default(),
        body.agent_id.as_deref().unwrap_or_default(),
        body.agent_type.as_deref().unwrap_or_default(),
        &body.role_context,
        &body.skills_to_restore,
        &body.tools_used,
        body.progress_summary.as_deref(),
    )
    .await?;

    emit_all(
        &state.pool,
        &events::agent_event(
            &context.agent_id,
            "context.updated",
            json!({ "agent_id": context.agent_id, "project_id": context.project_id }),
        ),
    )
    .await;

    Ok((StatusCode::CREATED, Json(context)))
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    #[serde(default)]
    project_id: Option<Uuid>,
    #[serde(default)]
    agent_type: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Page<AgentContext>>, ApiError> {
    let page = Pagination {
        limit: filter.limit,
        offset: filter.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());
    let items = contexts::list(
        &state.pool,
        filter.project_id,
        filter.agent_type.as_deref(),
        limit,
        offset,
    )
    .await?;
    Ok(Json(Page::new(items, limit, offset)))
}

async fn stats(State(state): State<AppState>) -> Result<Json<contexts::ContextStats>, ApiError> {
    Ok(Json(contexts::stats(&state.pool).await?))
}
