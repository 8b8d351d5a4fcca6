// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Subscription endpoints. Subscribe/unsubscribe are idempotent on the
//! natural key (agent_id, topic).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use swarmlink_proto::MessageTopic;
use swarmlink_store::models::Subscription;
use swarmlink_store::queries::subscriptions;

use crate::error::{ApiError, FieldErrors};
use crate::events;
use crate::extract::Body;
use crate::pagination::{Page, Pagination};
use crate::routes::emit_all;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
        .route("/subscriptions", get(list))
        // One segment serves both contracts: GET reads it as an agent id,
        // DELETE as a subscription row id.
        .route("/subscriptions/:key", get(for_agent).delete(remove))
}

#[derive(Debug, Deserialize)]
struct SubscribeBody {
    agent_id: Option<String>,
    topic: Option<String>,
    #[serde(default)]
    callback_url: Option<String>,
}

fn validated(body: &SubscribeBody) -> Result<(&str, MessageTopic), ApiError> {
    let mut errors = FieldErrors::new();
    let agent_id = body.agent_id.as_deref().unwrap_or("");
    errors.require("agent_id", !agent_id.is_empty());
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
    Ok((
        body.agent_id.as_deref().unwrap_or_default(),
        topic.unwrap_or(MessageTopic::WorkflowProgress),
    ))
}

async fn subscribe(
    State(state): State<AppState>,
    Body(body): Body<SubscribeBody>,
) -> Result<(StatusCode, Json<Subscription>), ApiError> {
    let (agent_id, topic) = validated(&body)?;
    let sub = subscriptions::upsert(
        &state.pool,
        agent_id,
        topic.as_str(),
        body.callback_url.as_deref(),
    )
    .await?;

    emit_all(
        &state.pool,
        &events::agent_event(
            agent_id,
            "subscription.created",
            json!({ "agent_id": agent_id, "topic": topic }),
        ),
    )
    .await;
    Ok((StatusCode::CREATED, Json(sub)))
}

async fn unsubscribe(
    State(state): State<AppState>,
    Body(body): Body<SubscribeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (agent_id, topic) = validated(&body)?;
    let removed = subscriptions::delete_by_key(&state.pool, agent_id, topic.as_str()).await?;
    Ok(Json(json!({ "removed": removed })))
}

async fn list(
    State(state): State<AppState>,
    axum::extract::Query(page): axum::extract::Query<Pagination>,
) -> Result<Json<Page<Subscription>>, ApiError> {
    let (limit, offset) = (page.limit(), page.offset());
    let items = subscriptions::list(&state.pool, limit, offset).await?;
    Ok(Json(Page::new(items, limit, offset)))
}

async fn for_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    Ok(Json(subscriptions::for_agent(&state.pool, &agent_id).await?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: Uuid = id
        .parse()
        .map_err(|_| ApiError::invalid("id", "must be a subscription UUID"))?;
    subscriptions::delete(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
