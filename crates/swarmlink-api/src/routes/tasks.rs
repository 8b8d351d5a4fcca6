// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Task (wave) endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use swarmlink_store::models::{Task, TaskStatus};
use swarmlink_store::queries::tasks;

use crate::error::{ApiError, FieldErrors};
use crate::events;
use crate::extract::Body;
use crate::pagination::{Page, Pagination};
use crate::routes::emit_all;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", post(create).get(list))
        .route("/tasks/:id", get(show).patch(update).delete(remove))
}

#[derive(Debug, Deserialize)]
struct CreateTask {
    request_id: Option<Uuid>,
    name: Option<String>,
    #[serde(default)]
    wave_number: Option<i32>,
}

async fn create(
    State(state): State<AppState>,
    Body(body): Body<CreateTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let mut errors = FieldErrors::new();
    errors.require("request_id", body.request_id.is_some());
    errors.require("name", body.name.as_deref().is_some_and(|n| !n.is_empty()));
    if body.wave_number.is_some_and(|w| w < 0) {
        errors.push("wave_number", "must be >= 0");
    }
    errors.check()?;

    let task = tasks::create(
        &state.pool,
        body.request_id.unwrap_or_default(),
        body.name.as_deref().unwrap_or_default(),
        body.wave_number,
    )
    .await?;

    emit_all(&state.pool, &events::task_created(&task)).await;
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    #[serde(default)]
    request_id: Option<Uuid>,
    #[serde(default)]
    status: Option<TaskStatus>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Page<Task>>, ApiError> {
    let page = Pagination {
        limit: filter.limit,
        offset: filter.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());
    let items = tasks::list(&state.pool, filter.request_id, filter.status, limit, offset).await?;
    Ok(Json(Page::new(items, limit, offset)))
}

async fn show(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Task>, ApiError> {
    Ok(Json(tasks::get(&state.pool, id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Body(patch): Body<tasks::UpdateTask>,
) -> Result<Json<Task>, ApiError> {
    if patch.wave_number.is_some_and(|w| w < 0) {
        return Err(ApiError::invalid("wave_number", "must be >= 0"));
    }
    let task = tasks::update(&state.pool, id, &patch).await?;
    emit_all(&state.pool, &events::task_updated(&task)).await;
    Ok(Json(task))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    tasks::delete(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
