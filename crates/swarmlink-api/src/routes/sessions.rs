// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Session endpoints. Creation is strict — a duplicate client-supplied id
//! is a 409, never an upsert.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use swarmlink_store::models::Session;
use swarmlink_store::queries::{projects, sessions};

use crate::error::{ApiError, FieldErrors};
use crate::events;
use crate::extract::Body;
use crate::pagination::{Page, Pagination};
use crate::routes::emit_all;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create).get(list))
        .route("/sessions/stats", get(stats))
        .route("/sessions/:id", get(show).patch(update).delete(remove))
}

#[derive(Debug, Deserialize)]
struct CreateSession {
    id: Option<String>,
    #[serde(default)]
    project_id: Option<Uuid>,
    #[serde(default)]
    project_path: Option<String>,
    #[serde(default = "empty_object")]
    metadata: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    json!({})
}

async fn create(
    State(state): State<AppState>,
    Body(body): Body<CreateSession>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let mut errors = FieldErrors::new();
    let id = body.id.as_deref().unwrap_or("");
    errors.require("id", !id.is_empty());
    if let Some(path) = body.project_path.as_deref() {
        if !path.starts_with('/') {
            errors.push("project_path", "must be an absolute path");
        }
    }
    errors.check()?;

    // A project path upserts the project; an explicit id must exist.
    let project_id = match (&body.project_path, body.project_id) {
        (Some(path), _) => Some(projects::upsert(&state.pool, path, None, &json!({})).await?.id),
        (None, Some(project_id)) => Some(projects::get(&state.pool, project_id).await?.id),
        (None, None) => None,
    };

    let session = sessions::create(&state.pool, id, project_id, &body.metadata).await?;
    emit_all(&state.pool, &events::session_event(&session.id, "session.created")).await;
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    #[serde(default)]
    project_id: Option<Uuid>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Page<Session>>, ApiError> {
    let page = Pagination {
        limit: filter.limit,
        offset: filter.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());
    let items = sessions::list(
        &state.pool,
        filter.project_id,
        filter.active.unwrap_or(false),
        limit,
        offset,
    )
    .await?;
    Ok(Json(Page::new(items, limit, offset)))
}

async fn stats(State(state): State<AppState>) -> Result<Json<sessions::SessionStats>, ApiError> {
    Ok(Json(sessions::stats(&state.pool).await?))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(sessions::get(&state.pool, &id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Body(patch): Body<sessions::UpdateSession>,
) -> Result<Json<Session>, ApiError> {
    if let Some(metadata) = &patch.metadata {
        if !metadata.is_object() {
            return Err(ApiError::invalid("metadata", "must be an object"));
        }
    }
    let session = sessions::update(&state.pool, &id, &patch).await?;
    let event = if session.ended_at.is_some() {
        "session.ended"
    } else {
        "session.updated"
    };
    emit_all(&state.pool, &events::session_event(&session.id, event)).await;
    Ok(Json(session))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    sessions::delete(&state.pool, &id).await?;
    emit_all(&state.pool, &events::session_event(&id, "session.deleted")).await;
    Ok(StatusCode::NO_CONTENT)
}
