// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Project endpoints. Creation is idempotent on `path` — hook clients may
//! post the same project on every event.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use swarmlink_store::models::Project;
use swarmlink_store::queries::projects;

use crate::error::{ApiError, FieldErrors};
use crate::events;
use crate::extract::Body;
use crate::pagination::{Page, Pagination};
use crate::routes::emit_all;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", post(create).get(list))
        .route("/projects/by-path", get(by_path))
        .route("/projects/:id", get(show).delete(remove))
}

#[derive(Debug, Deserialize)]
struct CreateProject {
    path: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "empty_object")]
    metadata: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    json!({})
}

async fn create(
    State(state): State<AppState>,
    Body(body): Body<CreateProject>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let mut errors = FieldErrors::new();
    let path = body.path.as_deref().unwrap_or("");
    errors.require("path", !path.is_empty());
    if !path.is_empty() && !path.starts_with('/') {
        errors.push("path", "must be an absolute path");
    }
    if !body.metadata.is_object() {
        errors.push("metadata", "must be an object");
    }
    errors.check()?;

    let project = projects::upsert(
        &state.pool,
        path,
        body.name.as_deref(),
        &body.metadata,
    )
    .await?;

    emit_all(
        &state.pool,
        &events::global_event(
            "project.created",
            json!({ "project_id": project.id, "path": project.path }),
        ),
    )
    .await;

    Ok((StatusCode::CREATED, Json(project)))
}

async fn list(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Page<Project>>, ApiError> {
    let (limit, offset) = (page.limit(), page.offset());
    let items = projects::list(&state.pool, limit, offset).await?;
    Ok(Json(Page::new(items, limit, offset)))
}

#[derive(Debug, Deserialize)]
struct ByPath {
    path: String,
}

async fn by_path(
    State(state): State<AppState>,
    Query(query): Query<ByPath>,
) -> Result<Json<Project>, ApiError> {
    let project = projects::by_path(&state.pool, &query.path).await?;
    Ok(Json(project))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(projects::get(&state.pool, id).await?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    projects::delete(&state.pool, id).await?;
    emit_all(
        &state.pool,
        &events::global_event("project.deleted", json!({ "project_id": id })),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
