// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! WS token mint. The only REST endpoint with an auth-shaped contract:
//! 429 on rate exhaustion (10 per 15-minute window per origin identity),
//! 503 when the process has no signing secret.
//!
//! The limiter key is the requesting `agent_id`, falling back to the peer
//! IP when the request carries no usable agent id — the window is consumed
//! before validation, so malformed requests cannot probe the endpoint
//! unmetered.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use swarmlink_proto::token::{sign_token, TokenClaims};

use crate::error::{ApiError, FieldErrors};
use crate::extract::Body;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/auth/token", post(mint))
}

#[derive(Debug, Deserialize)]
struct MintRequest {
    agent_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

async fn mint(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Body(body): Body<MintRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent_id = body.agent_id.as_deref().unwrap_or("");
    let identity = if agent_id.is_empty() {
        addr.ip().to_string()
    } else {
        agent_id.to_string()
    };

    if !state.allow_mint(&identity) {
        warn!(identity = %identity, "token mint rate limit exceeded");
        return Err(ApiError::RateLimited);
    }

    let mut errors = FieldErrors::new();
    errors.require("agent_id", !agent_id.is_empty());
    errors.check()?;

    let secret = state
        .config
        .secret_bytes()
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;

    let mut claims = TokenClaims::issue(agent_id, body.session_id.clone(), Utc::now());
    claims.exp = claims.iat + state.config.auth.token_ttl_secs as i64;
    let token = sign_token(&claims, &secret);

    Ok(Json(json!({
        "token": token,
        "agent_id": claims.agent_id,
        "session_id": claims.session_id,
        "issued_at": claims.iat,
        "expires_at": claims.exp,
    })))
}
