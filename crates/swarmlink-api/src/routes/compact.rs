// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Compact save & restore — surviving a host context compaction.
//!
//! Save stores the pre-compaction snapshot as an `agent_contexts` row
//! (`agent_type = "compact-snapshot"`, one per session via upsert).
//! Restore marks the session compacted, regenerates a brief from live
//! state *plus* the saved snapshot, and appends the host's own summary
//! under a "Previous Context Summary" heading.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use swarmlink_store::queries::{contexts, sessions};

use crate::brief::{self, BriefRequest};
use crate::error::{ApiError, FieldErrors};
use crate::events;
use crate::extract::Body;
use crate::routes::emit_all;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/compact/save", post(save))
        .route("/compact/restore", post(restore))
        .route("/compact/snapshot/:session_id", get(snapshot))
        .route("/compact/status/:session_id", get(status))
}

const TRIGGERS: [&str; 3] = ["auto", "manual", "proactive"];

#[derive(Debug, Deserialize, Serialize)]
struct SaveCompact {
    session_id: Option<String>,
    trigger: Option<String>,
    #[serde(default)]
    context_summary: Option<String>,
    #[serde(default)]
    active_tasks: Vec<serde_json::Value>,
    #[serde(default)]
    modified_files: Vec<String>,
    #[serde(default)]
    key_decisions: Vec<String>,
    #[serde(default)]
    agent_states: Vec<serde_json::Value>,
}

async fn save(
    State(state): State<AppState>,
    Body(body): Body<SaveCompact>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let mut errors = FieldErrors::new();
    let session_id = body.session_id.as_deref().unwrap_or("");
    errors.require("session_id", !session_id.is_empty());
    match body.trigger.as_deref() {
        Some(t) if TRIGGERS.contains(&t) => {}
        Some(t) => errors.push("trigger", format!("unknown trigger {t:?}")),
        None => errors.push("trigger", "required"),
    }
    errors.check()?;

    let session = sessions::get(&state.pool, session_id).await?;
    let Some(project_id) = session.project_id else {
        return Err(ApiError::invalid(
            "session_id",
            "session has no project; snapshots are stored per project",
        ));
    };

    // The entire payload is the snapshot.
    let payload = serde_json::to_value(&body).unwrap_or_else(|_| json!({}));
    let row = contexts::save_compact_snapshot(&state.pool, project_id, session_id, &payload).await?;

    emit_all(&state.pool, &events::session_event(session_id, "compact.saved")).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "saved": true,
            "session_id": session_id,
            "snapshot_id": row.id,
            "last_updated": row.last_updated,
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct RestoreCompact {
    session_id: Option<String>,
    agent_id: Option<String>,
    #[serde(default)]
    agent_type: Option<String>,
    #[serde(default)]
    compact_summary: Option<String>,
    #[serde(default)]
    max_tokens: Option<i64>,
}

async fn restore(
    State(state): State<AppState>,
    Body(body): Body<RestoreCompact>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut errors = FieldErrors::new();
    let session_id = body.session_id.as_deref().unwrap_or("");
    let agent_id = body.agent_id.as_deref().unwrap_or("");
    errors.require("session_id", !session_id.is_empty());
    errors.require("agent_id", !agent_id.is_empty());
    errors.check()?;

    sessions::mark_compacted(
        &state.pool,
        session_id,
        agent_id,
        body.compact_summary.as_deref(),
    )
    .await?;

    let req = BriefRequest {
        session_id: session_id.to_string(),
        agent_id: agent_id.to_string(),
        agent_type: body.agent_type.clone(),
        max_tokens: body.max_tokens,
        include_history: true,
        include_messages: true,
        include_blocking: true,
        history_limit: None,
    };
    let mut inputs = brief::load_inputs(&state.pool, &req).await?;
    inputs.snapshot = contexts::compact_snapshot(&state.pool, session_id)
        .await?
        .map(|row| row.role_context);
    inputs.previous_summary = body.compact_summary.clone();

    let restored = brief::generate(&req, &inputs, Utc::now());

    emit_all(&state.pool, &events::session_event(session_id, "compact.restored")).await;

    Ok(Json(json!({
        "session_id": session_id,
        "agent_id": agent_id,
        "brief": restored.content,
        "token_count": restored.token_count,
        "truncated": restored.truncated,
        "generated_at": restored.generated_at,
        "sources": restored.sources,
    })))
}

async fn snapshot(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row = contexts::compact_snapshot(&state.pool, &session_id)
        .await?
        .ok_or(ApiError::NotFound("compact snapshot"))?;
    Ok(Json(json!({
        "session_id": session_id,
        "snapshot": row.role_context,
        "saved_at": row.last_updated,
    })))
}

async fn status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = contexts::compact_snapshot(&state.pool, &session_id).await?;
    let session = match sessions::get(&state.pool, &session_id).await {
        Ok(session) => Some(session),
        Err(swarmlink_store::StoreError::NotFound { .. }) => None,
        Err(e) => return Err(e.into()),
    };
    let meta = session.as_ref().map(|s| &s.metadata);

    Ok(Json(json!({
        "exists": snapshot.is_some(),
        "compacted": meta
            .and_then(|m| m.get("compacted"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        "compacted_at": meta.and_then(|m| m.get("compacted_at")),
        "compact_summary": meta.and_then(|m| m.get("compact_summary")),
        "compact_agent": meta.and_then(|m| m.get("compact_agent")),
    })))
}
