// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Routing store endpoints: suggestions, feedback, stats.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use swarmlink_store::keywords::{SCORE_MAX, SCORE_MIN};
use swarmlink_store::models::ToolType;
use swarmlink_store::queries::routing;

use crate::error::{ApiError, FieldErrors};
use crate::extract::Body;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/routing/suggest", get(suggest))
        .route("/routing/stats", get(stats))
        .route("/routing/feedback", post(feedback))
}

const DEFAULT_SUGGESTIONS: i64 = 5;
const MAX_SUGGESTIONS: i64 = 25;

#[derive(Debug, Deserialize)]
struct SuggestQuery {
    keywords: String,
    #[serde(default)]
    tool_type: Option<String>,
    #[serde(default)]
    min_score: Option<f32>,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SuggestResponse {
    keywords: Vec<String>,
    suggestions: Vec<routing::Suggestion>,
    /// `tool|type|score|matches` lines for shell consumers.
    compat_output: String,
}

async fn suggest(
    State(state): State<AppState>,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<SuggestResponse>, ApiError> {
    let keywords: Vec<String> = query
        .keywords
        .split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return Err(ApiError::invalid("keywords", "at least one keyword required"));
    }

    let tool_type = match query.tool_type.as_deref() {
        None => None,
        Some(raw) => Some(
            raw.parse::<ToolType>()
                .map_err(|e| ApiError::invalid("tool_type", e.to_string()))?,
        ),
    };
    let min_score = query.min_score.unwrap_or(SCORE_MIN).clamp(SCORE_MIN, SCORE_MAX);
    let limit = query.limit.unwrap_or(DEFAULT_SUGGESTIONS).clamp(1, MAX_SUGGESTIONS);

    let suggestions = routing::suggest(&state.pool, &keywords, tool_type, min_score, limit).await?;

    let compat_output = suggestions
        .iter()
        .map(|s| {
            format!(
                "{}|{}|{:.2}|{}",
                s.tool_name, s.tool_type, s.score, s.match_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Json(SuggestResponse {
        keywords,
        suggestions,
        compat_output,
    }))
}

#[derive(Debug, Deserialize)]
struct Feedback {
    tool_name: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    chosen: Option<bool>,
}

async fn feedback(
    State(state): State<AppState>,
    Body(body): Body<Feedback>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut errors = FieldErrors::new();
    errors.require(
        "tool_name",
        body.tool_name.as_deref().is_some_and(|t| !t.is_empty()),
    );
    errors.require("keywords", !body.keywords.is_empty());
    errors.require("chosen", body.chosen.is_some());
    errors.check()?;

    let keywords: Vec<String> = body.keywords.iter().map(|k| k.to_lowercase()).collect();
    let updated = routing::apply_feedback(
        &state.pool,
        body.tool_name.as_deref().unwrap_or_default(),
        &keywords,
        body.chosen.unwrap_or(false),
    )
    .await?;

    Ok(Json(json!({ "updated": updated })))
}

async fn stats(State(state): State<AppState>) -> Result<Json<routing::RoutingStats>, ApiError> {
    Ok(Json(routing::stats(&state.pool).await?))
}
