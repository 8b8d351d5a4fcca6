// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Subtask endpoints.
//!
//! The PATCH handler is the one place a status change, its broadcast
//! message, and its notifications must commit together: the transition,
//! the `agent.completed` message insert, and every `pg_notify` run in one
//! transaction, so WS clients never observe a half-applied transition.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use swarmlink_store::models::{Subtask, SubtaskStatus};
use swarmlink_store::notify;
use swarmlink_store::queries::{messages, subtasks};

use crate::error::{ApiError, FieldErrors};
use crate::events;
use crate::extract::Body;
use crate::pagination::{Page, Pagination};
use crate::routes::emit_all;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subtasks", post(create).get(list))
        .route("/subtasks/:id", get(show).patch(update).delete(remove))
}

async fn create(
    State(state): State<AppState>,
    Body(body): Body<subtasks::CreateSubtask>,
) -> Result<(StatusCode, Json<Subtask>), ApiError> {
    let mut errors = FieldErrors::new();
    errors.require("description", !body.description.is_empty());
    errors.check()?;

    let subtask = subtasks::create(&state.pool, &body).await?;
    emit_all(&state.pool, &events::subtask_created(&subtask)).await;
    Ok((StatusCode::CREATED, Json(subtask)))
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    #[serde(default)]
    task_id: Option<Uuid>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    status: Option<SubtaskStatus>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Page<Subtask>>, ApiError> {
    let page = Pagination {
        limit: filter.limit,
        offset: filter.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());
    let items = subtasks::list(
        &state.pool,
        filter.task_id,
        filter.agent_id.as_deref(),
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
) -> Result<Json<Subtask>, ApiError> {
    Ok(Json(subtasks::get(&state.pool, id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Body(patch): Body<subtasks::UpdateSubtask>,
) -> Result<Json<Subtask>, ApiError> {
    let mut tx = state.pool.begin().await.map_err(ApiError::Database)?;

    let (subtask, transition) = subtasks::update_in_tx(&mut tx, id, &patch).await?;
    for n in events::subtask_transition(&subtask, &transition) {
        notify::emit(&mut *tx, &n).await.map_err(ApiError::Database)?;
    }

    if transition.became_terminal {
        let (from_agent, payload) = events::subtask_completion_message(&subtask);
        let message = messages::insert_in_tx(
            &mut tx,
            &from_agent,
            None,
            swarmlink_proto::MessageTopic::AgentCompleted.as_str(),
            &payload,
            7,
            state.config.messaging.default_ttl_secs as i64,
        )
        .await?;
        for n in events::message_published(&message) {
            notify::emit(&mut *tx, &n).await.map_err(ApiError::Database)?;
        }
    }

    tx.commit().await.map_err(ApiError::Database)?;

    Ok(Json(subtask))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    subtasks::delete(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
