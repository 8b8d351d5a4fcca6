// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The context brief generator — "what was I doing?" for an agent.
//!
//! Generation is split into a load phase and a pure render phase:
//! [`load_inputs`] runs the deterministic query pipeline (active subtasks,
//! unread messages, blockings, recent actions, session and project rows),
//! then [`generate`] selects a template, fills its slots, and applies the
//! token budget. Two concurrent calls for the same agent are both fine —
//! nothing is cached and nothing is written.

pub mod budget;
pub mod templates;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use swarmlink_store::models::{Action, AgentMessage, Blocking, Project, Session, Subtask};
use swarmlink_store::queries::{actions, blocking, messages, projects, sessions, subtasks};
use swarmlink_store::StoreError;

/// Most recent actions included by default / at most.
pub const DEFAULT_HISTORY: i64 = 10;
pub const MAX_HISTORY: i64 = 50;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct BriefRequest {
    pub session_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
    #[serde(default = "default_true")]
    pub include_history: bool,
    #[serde(default = "default_true")]
    pub include_messages: bool,
    #[serde(default = "default_true")]
    pub include_blocking: bool,
    #[serde(default)]
    pub history_limit: Option<i64>,
}

impl BriefRequest {
    pub fn history_limit(&self) -> i64 {
        self.history_limit
            .unwrap_or(DEFAULT_HISTORY)
            .clamp(1, MAX_HISTORY)
    }
}

/// Everything [`generate`] reads — a point-in-time database snapshot plus
/// the optional compact-restore extras.
#[derive(Debug, Default)]
pub struct BriefInputs {
    pub subtasks: Vec<Subtask>,
    pub messages: Vec<AgentMessage>,
    pub blockings: Vec<Blocking>,
    pub actions: Vec<Action>,
    pub session: Option<Session>,
    pub project: Option<Project>,
    /// A saved compact snapshot (`role_context` payload), when restoring.
    pub snapshot: Option<serde_json::Value>,
    /// Host-supplied summary of the compacted conversation, when restoring.
    pub previous_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Brief {
    pub content: String,
    pub token_count: usize,
    pub truncated: bool,
    pub generated_at: DateTime<Utc>,
    pub sources: Vec<String>,
}

/// The deterministic load pipeline (steps 1–5 of the assembly order).
pub async fn load_inputs(pool: &PgPool, req: &BriefRequest) -> Result<BriefInputs, StoreError> {
    let mut inputs = BriefInputs::default();

    inputs.subtasks =
        subtasks::active_for_agent(pool, &req.agent_id, req.agent_type.as_deref()).await?;

    if req.include_messages {
        inputs.messages = messages::peek_unread(pool, &req.agent_id, 25).await?;
    }

    if req.include_blocking {
        inputs.blockings = blocking::blocking_agent(pool, &req.agent_id).await?;
    }

    if req.include_history {
        inputs.actions =
            actions::recent_for_session(pool, &req.session_id, req.history_limit()).await?;
    }

    inputs.session = match sessions::get(pool, &req.session_id).await {
        Ok(session) => Some(session),
        Err(StoreError::NotFound { .. }) => None,
        Err(e) => return Err(e),
    };
    if let Some(project_id) = inputs.session.as_ref().and_then(|s| s.project_id) {
        inputs.project = match projects::get(pool, project_id).await {
            Ok(project) => Some(project),
            Err(StoreError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
    }

    Ok(inputs)
}

/// Pure: template selection, slot filling, token budget.
pub fn generate(req: &BriefRequest, inputs: &BriefInputs, now: DateTime<Utc>) -> Brief {
    let kind = templates::select(req.agent_type.as_deref());
    let content = templates::render(kind, &req.agent_id, inputs);
    let max_tokens = budget::clamp_max_tokens(req.max_tokens);
    let (content, token_count, truncated) = budget::apply_budget(content, max_tokens);

    Brief {
        content,
        token_count,
        truncated,
        generated_at: now,
        sources: sources_of(inputs),
    }
}

fn sources_of(inputs: &BriefInputs) -> Vec<String> {
    let mut sources = Vec::new();
    if !inputs.subtasks.is_empty() {
        sources.push(format!("subtasks:{}", inputs.subtasks.len()));
    }
    if !inputs.messages.is_empty() {
        sources.push(format!("messages:{}", inputs.messages.len()));
    }
    if !inputs.blockings.is_empty() {
        sources.push(format!("blockings:{}", inputs.blockings.len()));
    }
    if !inputs.actions.is_empty() {
        sources.push(format!("actions:{}", inputs.actions.len()));
    }
    if inputs.session.is_some() {
        sources.push("session".to_string());
    }
    if inputs.project.is_some() {
        sources.push("project".to_string());
    }
    if inputs.snapshot.is_some() {
        sources.push("compact-snapshot".to_string());
    }
    if inputs.previous_summary.is_some() {
        sources.push("previous-summary".to_string());
    }
    sources
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn request(agent_type: &str) -> BriefRequest {
        BriefRequest {
            session_id: "S1".into(),
            agent_id: "agent-1".into(),
            agent_type: Some(agent_type.into()),
            max_tokens: None,
            include_history: true,
            include_messages: true,
            include_blocking: true,
            history_limit: None,
        }
    }

    #[test]
    fn history_limit_defaults_and_caps() {
        let mut req = request("developer");
        assert_eq!(req.history_limit(), DEFAULT_HISTORY);
        req.history_limit = Some(500);
        assert_eq!(req.history_limit(), MAX_HISTORY);
        req.history_limit = Some(0);
        assert_eq!(req.history_limit(), 1);
    }

    #[test]
    fn generation_is_deterministic_given_a_snapshot() {
        let req = request("orchestrator");
        let inputs = BriefInputs::default();
        let now = Utc::now();
        let a = generate(&req, &inputs, now);
        let b = generate(&req, &inputs, now);
        assert_eq!(a.content, b.content);
        assert_eq!(a.token_count, b.token_count);
    }

    #[test]
    fn empty_inputs_produce_an_untruncated_brief() {
        let req = request("validator");
        let brief = generate(&req, &BriefInputs::default(), Utc::now());
        assert!(!brief.truncated);
        assert!(brief.token_count > 0);
        assert!(brief.sources.is_empty(), "nothing contributed");
    }

    #[test]
    fn snapshot_and_summary_show_up_in_sources() {
        let req = request("orchestrator");
        let inputs = BriefInputs {
            snapshot: Some(serde_json::json!({"active_tasks": []})),
            previous_summary: Some("jwt chosen".into()),
            ..Default::default()
        };
        let brief = generate(&req, &inputs, Utc::now());
        assert!(brief.sources.contains(&"compact-snapshot".to_string()));
        assert!(brief.sources.contains(&"previous-summary".to_string()));
        assert!(brief.content.contains("jwt chosen"));
    }

    #[test]
    fn tight_budget_marks_truncation() {
        let req = BriefRequest {
            max_tokens: Some(100),
            ..request("developer")
        };
        let inputs = BriefInputs {
            previous_summary: Some("decision text ".repeat(200)),
            ..Default::default()
        };
        let brief = generate(&req, &inputs, Utc::now());
        assert!(brief.truncated);
        assert!(brief.token_count <= 120, "budget must be respected");
    }
}
