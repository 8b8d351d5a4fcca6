// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Messaging endpoints: publish and deliver.
//!
//! Delivery marks the reader in the same statement that selects the rows,
//! so the unread set is idempotent — a second GET right after returns
//! nothing new. Broadcast rows are marked per-reader the same way.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use swarmlink_proto::MessageTopic;
use swarmlink_store::models::AgentMessage;
use swarmlink_store::notify;
use swarmlink_store::queries::messages;

use crate::error::{ApiError, FieldErrors};
use crate::events;
use crate::extract::Body;
use crate::pagination::{Page, Pagination};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", post(publish).get(list))
        .route("/messages/:agent_id", get(deliver))
}

#[derive(Debug, Deserialize)]
struct PublishMessage {
    from_agent: Option<String>,
    #[serde(default)]
    to_agent: Option<String>,
    topic: Option<String>,
    #[serde(default = "empty_object")]
    payload: serde_json::Value,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default)]
    ttl_seconds: Option<i64>,
}

fn empty_object() -> serde_json::Value {
    json!({})
}

async fn publish(
    State(state): State<AppState>,
    Body(body): Body<PublishMessage>,
) -> Result<(StatusCode, Json<AgentMessage>), ApiError> {
    let mut errors = FieldErrors::new();
    errors.require(
        "from_agent",
        body.from_agent.as_deref().is_some_and(|a| !a.is_empty()),
    );
    let topic = match body.topic.as_deref() {
        None => {
            errors.push("topic", "required");
            None
        }
        Some(raw) => match raw.parse::<MessageTopic>() {
            Ok(topic) => Some(topic),
            Err(e) => {
                errors.push("topic", e.to_string());
                None
            }
        },
    };
    errors.check()?;

    let priority = messages::clamp_priority(body.priority.unwrap_or(5));
    let ttl = body
        .ttl_seconds
        .unwrap_or(state.config.messaging.default_ttl_secs as i64);

    // Insert and notify in one transaction so subscribers never see a
    // message that did not commit.
    let mut tx = state.pool.begin().await.map_err(ApiError::Database)?;
    let message = messages::insert_in_tx(
        &mut tx,
        body.from_agent.as_deref().unwrap_or_default(),
        body.to_agent.as_deref(),
        topic.map(|t| t.as_str()).unwrap_or_default(),
        &body.payload,
        priority,
        ttl,
    )
    .await?;
    for n in events::message_published(&message) {
        notify::emit(&mut *tx, &n).await.map_err(ApiError::Database)?;
    }
    tx.commit().await.map_err(ApiError::Database)?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    from_agent: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Page<AgentMessage>>, ApiError> {
    let page = Pagination {
        limit: filter.limit,
        offset: filter.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());
    let items = messages::list(
        &state.pool,
        filter.topic.as_deref(),
        filter.from_agent.as_deref(),
        limit,
        offset,
    )
    .await?;
    Ok(Json(Page::new(items, limit, offset)))
}

#[derive(Debug, Deserialize)]
struct DeliverFilter {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    since: Option<DateTime<Utc>>,
    #[serde(default)]
    limit: Option<i64>,
}

async fn deliver(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(filter): Query<DeliverFilter>,
) -> Result<Json<Page<AgentMessage>>, ApiError> {
    let limit = Pagination {
        limit: filter.limit,
        offset: None,
    }
    .limit();
    let items = messages::deliver(
        &state.pool,
        &agent_id,
        filter.topic.as_deref(),
        filter.since,
        limit,
    )
    .await?;
    Ok(Json(Page::new(items, limit, 0)))
}
