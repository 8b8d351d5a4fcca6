// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Blocking endpoints — assertions that an agent must not proceed.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use swarmlink_store::models::Blocking;
use swarmlink_store::queries::blocking;

use crate::error::{ApiError, FieldErrors};
use crate::events;
use crate::extract::Body;
use crate::routes::emit_all;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blocking", post(create))
        .route("/blocking/check", get(check))
        .route("/blocking/:agent_id", get(for_agent).delete(release))
        .route("/unblock", post(unblock))
}

#[derive(Debug, Deserialize)]
struct CreateBlocking {
    blocker: Option<String>,
    blocked: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    Body(body): Body<CreateBlocking>,
) -> Result<(StatusCode, Json<Blocking>), ApiError> {
    let mut errors = FieldErrors::new();
    let blocker = body.blocker.as_deref().unwrap_or("");
    let blocked = body.blocked.as_deref().unwrap_or("");
    errors.require("blocker", !blocker.is_empty());
    errors.require("blocked", !blocked.is_empty());
    if !blocker.is_empty() && blocker == blocked {
        errors.push("blocked", "an agent cannot block itself");
    }
    errors.check()?;

    let row = blocking::upsert(&state.pool, blocker, blocked, body.reason.as_deref()).await?;

    emit_all(
        &state.pool,
        &events::agent_event(
            blocked,
            "blocking.created",
            json!({ "blocker": blocker, "blocked": blocked, "reason": body.reason }),
        ),
    )
    .await;
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Debug, Deserialize)]
struct CheckQuery {
    blocker: String,
    blocked: String,
}

async fn check(
    State(state): State<AppState>,
    Query(query): Query<CheckQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let blocked = blocking::check(&state.pool, &query.blocker, &query.blocked).await?;
    Ok(Json(json!({ "blocked": blocked })))
}

async fn for_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<Vec<Blocking>>, ApiError> {
    Ok(Json(blocking::for_agent(&state.pool, &agent_id).await?))
}

/// Release everything blocking `agent_id`; reports how many edges dropped.
async fn release(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let released = blocking::release_blocked(&state.pool, &agent_id).await?;
    if released > 0 {
        emit_all(
            &state.pool,
            &events::agent_event(
                &agent_id,
                "blocking.removed",
                json!({ "blocked": agent_id, "released": released }),
            ),
        )
        .await;
    }
    Ok(Json(json!({ "released": released })))
}

#[derive(Debug, Deserialize)]
struct UnblockBody {
    blocker: Option<String>,
    blocked: Option<String>,
}

async fn unblock(
    State(state): State<AppState>,
    Body(body): Body<UnblockBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut errors = FieldErrors::new();
    let blocker = body.blocker.as_deref().unwrap_or("");
    let blocked = body.blocked.as_deref().unwrap_or("");
    errors.require("blocker", !blocker.is_empty());
    errors.require("blocked", !blocked.is_empty());
    errors.check()?;

    let removed = blocking::unblock(&state.pool, blocker, blocked).await?;
    if removed > 0 {
        emit_all(
            &state.pool,
            &events::agent_event(
                blocked,
                "blocking.removed",
                json!({ "blocker": blocker, "blocked": blocked }),
            ),
        )
        .await;
    }
    Ok(Json(json!({ "removed": removed })))
}
