// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Action endpoints. `POST /actions` is the fire-and-forget hook hot path;
//! the entire side-effect group (project upsert, session counters, insert,
//! keyword scores, notify) runs as one transaction in the store.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use swarmlink_store::models::Action;
use swarmlink_store::queries::actions;

use crate::error::{ApiError, FieldErrors};
use crate::extract::Body;
use crate::pagination::{Page, Pagination};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/actions", post(ingest).get(list))
        .route("/actions/hourly", get(hourly))
        .route("/actions/:id", delete(remove))
        .route("/actions/by-session/:session_id", delete(remove_by_session))
}

async fn ingest(
    State(state): State<AppState>,
    Body(body): Body<actions::IngestAction>,
) -> Result<(StatusCode, Json<actions::IngestOutcome>), ApiError> {
    let mut errors = FieldErrors::new();
    errors.require("tool_name", !body.tool_name.is_empty());
    if let Some(path) = body.project_path.as_deref() {
        if !path.starts_with('/') {
            errors.push("project_path", "must be an absolute path");
        }
    }
    if !body.metadata.is_object() {
        errors.push("metadata", "must be an object");
    }
    // An orphan action (no session, no subtask) has nothing to attach to.
    if body.session_id.is_none() && body.subtask_id.is_none() {
        errors.push("session_id", "either session_id or subtask_id is required");
    }
    errors.check()?;

    let outcome = actions::ingest(&state.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    subtask_id: Option<Uuid>,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Page<Action>>, ApiError> {
    let page = Pagination {
        limit: filter.limit,
        offset: filter.offset,
    };
    // Actions are the one listing with the raised cap (bulk export).
    let (limit, offset) = (page.action_limit(), page.offset());
    let items = actions::list(
        &state.pool,
        filter.session_id.as_deref(),
        filter.subtask_id,
        filter.tool_name.as_deref(),
        limit,
        offset,
    )
    .await?;
    Ok(Json(Page::new(items, limit, offset)))
}

async fn hourly(
    State(state): State<AppState>,
) -> Result<Json<Vec<actions::HourlyBucket>>, ApiError> {
    Ok(Json(actions::hourly(&state.pool).await?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    actions::delete(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_by_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = actions::delete_by_session(&state.pool, &session_id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}
