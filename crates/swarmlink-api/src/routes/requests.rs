// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Request endpoints — one row per user prompt.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use swarmlink_store::models::{PromptType, Request, RequestStatus};
use swarmlink_store::queries::requests;

use crate::error::{ApiError, FieldErrors};
use crate::events;
use crate::extract::Body;
use crate::pagination::{Page, Pagination};
use crate::routes::emit_all;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/requests", post(create).get(list))
        .route("/requests/:id", get(show).patch(update).delete(remove))
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    project_id: Option<Uuid>,
    session_id: Option<String>,
    prompt: Option<String>,
    #[serde(default)]
    prompt_type: Option<String>,
    #[serde(default = "empty_object")]
    metadata: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    json!({})
}

async fn create(
    State(state): State<AppState>,
    Body(body): Body<CreateRequest>,
) -> Result<(StatusCode, Json<Request>), ApiError> {
    let mut errors = FieldErrors::new();
    errors.require("project_id", body.project_id.is_some());
    errors.require(
        "session_id",
        body.session_id.as_deref().is_some_and(|s| !s.is_empty()),
    );
    errors.require(
        "prompt",
        body.prompt.as_deref().is_some_and(|p| !p.is_empty()),
    );
    let prompt_type = match body.prompt_type.as_deref() {
        None => PromptType::Other,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            errors.push("prompt_type", format!("unknown prompt type {raw:?}"));
            PromptType::Other
        }),
    };
    errors.check()?;

    let request = requests::create(
        &state.pool,
        body.project_id.unwrap_or_default(),
        body.session_id.as_deref().unwrap_or_default(),
        body.prompt.as_deref().unwrap_or_default(),
        prompt_type,
        &body.metadata,
    )
    .await?;

    emit_all(
        &state.pool,
        &events::session_event(&request.session_id, "request.created"),
    )
    .await;
    Ok((StatusCode::CREATED, Json(request)))
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    #[serde(default)]
    project_id: Option<Uuid>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    status: Option<RequestStatus>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Page<Request>>, ApiError> {
    let page = Pagination {
        limit: filter.limit,
        offset: filter.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());
    let items = requests::list(
        &state.pool,
        filter.project_id,
        filter.session_id.as_deref(),
        filter.status,
        limit,
        offset,
    )
    .await?;
    Ok(Json(Page::new(items, limit, offset)))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Request>, ApiError> {
    Ok(Json(requests::get(&state.pool, id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Body(patch): Body<requests::UpdateRequest>,
) -> Result<Json<Request>, ApiError> {
    if let Some(metadata) = &patch.metadata {
        if !metadata.is_object() {
            return Err(ApiError::invalid("metadata", "must be an object"));
        }
    }
    let request = requests::update(&state.pool, id, &patch).await?;
    emit_all(
        &state.pool,
        &events::session_event(&request.session_id, "request.updated"),
    )
    .await;
    Ok(Json(request))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    requests::delete(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
