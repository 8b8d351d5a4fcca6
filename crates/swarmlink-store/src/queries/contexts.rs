// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Agent context rows — both families: live agent state, and compact
//! snapshots stored under `agent_type = "compact-snapshot"` with the
//! `compact-snapshot:<session_id>` agent id. Both upsert on
//! (project_id, agent_id), which is what makes "exactly one snapshot per
//! session" hold.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{compact_snapshot_agent_id, AgentContext, COMPACT_SNAPSHOT_TYPE};

/// Upsert a live agent context row.
#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    pool: &PgPool,
    project_id: Uuid,
    agent_id: &str,
    agent_type: &str,
    role_context: &serde_json::Value,
    skills_to_restore: &[String],
    tools_used: &[String],
    progress_summary: Option<&str>,
) -> Result<AgentContext, StoreError> {
    let result = sqlx::query_as::<_, AgentContext>(
        r#"INSERT INTO agent_contexts
               (project_id, agent_id, agent_type, role_context,
                skills_to_restore, tools_used, progress_summary)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           ON CONFLICT (project_id, agent_id) DO UPDATE SET
               agent_type = EXCLUDED.agent_type,
               role_context = EXCLUDED.role_context,
               skills_to_restore = EXCLUDED.skills_to_restore,
               tools_used = EXCLUDED.tools_used,
               progress_summary = EXCLUDED.progress_summary
           RETURNING *"#,
    )
    .bind(project_id)
    .bind(agent_id)
    .bind(agent_type)
    .bind(role_context)
    .bind(skills_to_restore)
    .bind(tools_used)
    .bind(progress_summary)
    .fetch_one(pool)
    .await;

    result.map_err(|e| {
        let wrapped = StoreError::from(e);
        if wrapped.is_fk_violation() {
            StoreError::not_found("project")
        } else {
            wrapped
        }
    })
}

/// Store (or overwrite) the compact snapshot for a session.
pub async fn save_compact_snapshot(
    pool: &PgPool,
    project_id: Uuid,
    session_id: &str,
    payload: &serde_json::Value,
) -> Result<AgentContext, StoreError> {
    upsert(
        pool,
        project_id,
        &compact_snapshot_agent_id(session_id),
        COMPACT_SNAPSHOT_TYPE,
        payload,
        &[],
        &[],
        None,
    )
    .await
}

/// The stored compact snapshot for a session, if any.
pub async fn compact_snapshot(
    pool: &PgPool,
    session_id: &str,
) -> Result<Option<AgentContext>, StoreError> {
    let row = sqlx::query_as::<_, AgentContext>(
        r#"SELECT * FROM agent_contexts
           WHERE agent_id = $1 AND agent_type = $2
           ORDER BY last_updated DESC
           LIMIT 1"#,
    )
    .bind(compact_snapshot_agent_id(session_id))
    .bind(COMPACT_SNAPSHOT_TYPE)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Context rows for one agent across projects, newest first.
pub async fn for_agent(pool: &PgPool, agent_id: &str) -> Result<Vec<AgentContext>, StoreError> {
    let rows = sqlx::query_as::<_, AgentContext>(
        "SELECT * FROM agent_contexts WHERE agent_id = $1 ORDER BY last_updated DESC",
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list(
    pool: &PgPool,
    project_id: Option<Uuid>,
    agent_type: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<AgentContext>, StoreError> {
    let rows = sqlx::query_as::<_, AgentContext>(
        r#"SELECT * FROM agent_contexts
           WHERE ($1::uuid IS NULL OR project_id = $1)
             AND ($2::text IS NULL OR agent_type = $2)
           ORDER BY last_updated DESC
           LIMIT $3 OFFSET $4"#,
    )
    .bind(project_id)
    .bind(agent_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ContextStats {
    pub total_contexts: i64,
    pub live_contexts: i64,
    pub compact_snapshots: i64,
    pub distinct_agents: i64,
}

pub async fn stats(pool: &PgPool) -> Result<ContextStats, StoreError> {
    let stats = sqlx::query_as::<_, ContextStats>(
        r#"SELECT count(*) AS total_contexts,
                  count(*) FILTER (WHERE agent_type <> $1) AS live_contexts,
                  count(*) FILTER (WHERE agent_type = $1) AS compact_snapshots,
                  count(DISTINCT agent_id) AS distinct_agents
           FROM agent_contexts"#,
    )
    .bind(COMPACT_SNAPSHOT_TYPE)
    .fetch_one(pool)
    .await?;
    Ok(stats)
}
