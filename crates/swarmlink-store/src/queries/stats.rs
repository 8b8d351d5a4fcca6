// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Aggregation queries: the `/stats` family, the dashboard KPIs, the
//! hierarchy tree, and the bridge's 5-second metrics snapshot.
//!
//! The hierarchy endpoint builds the whole nested tree in one statement
//! with correlated `jsonb_agg` subqueries — never one query per level.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Overview {
    pub projects: i64,
    pub sessions: i64,
    pub active_sessions: i64,
    pub requests: i64,
    pub tasks: i64,
    pub subtasks: i64,
    pub actions: i64,
    pub messages: i64,
}

pub async fn overview(pool: &PgPool) -> Result<Overview, StoreError> {
    let overview = sqlx::query_as::<_, Overview>(
        r#"SELECT (SELECT count(*) FROM projects) AS projects,
                  (SELECT count(*) FROM sessions) AS sessions,
                  (SELECT count(*) FROM sessions WHERE ended_at IS NULL) AS active_sessions,
                  (SELECT count(*) FROM requests) AS requests,
                  (SELECT count(*) FROM tasks) AS tasks,
                  (SELECT count(*) FROM subtasks) AS subtasks,
                  (SELECT count(*) FROM actions) AS actions,
                  (SELECT count(*) FROM agent_messages) AS messages"#,
    )
    .fetch_one(pool)
    .await?;
    Ok(overview)
}

/// Per-project rollup from the `project_stats` view.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ProjectStats {
    pub project_id: Uuid,
    pub path: String,
    pub session_count: i64,
    pub request_count: i64,
    pub task_count: i64,
    pub subtask_count: i64,
    pub action_count: i64,
}

pub async fn per_project(pool: &PgPool, limit: i64) -> Result<Vec<ProjectStats>, StoreError> {
    let rows = sqlx::query_as::<_, ProjectStats>(
        "SELECT * FROM project_stats ORDER BY action_count DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ToolSummary {
    pub tool_name: String,
    pub tool_type: String,
    pub invocations: i64,
    pub successes: i64,
    pub errors: i64,
    pub avg_duration_ms: Option<f64>,
}

pub async fn tools_summary(pool: &PgPool) -> Result<Vec<ToolSummary>, StoreError> {
    let rows = sqlx::query_as::<_, ToolSummary>(
        r#"SELECT tool_name,
                  max(tool_type) AS tool_type,
                  count(*) AS invocations,
                  count(*) FILTER (WHERE exit_code = 0) AS successes,
                  count(*) FILTER (WHERE exit_code IS NOT NULL AND exit_code <> 0) AS errors,
                  avg(duration_ms)::float8 AS avg_duration_ms
           FROM actions
           GROUP BY tool_name
           ORDER BY invocations DESC"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DashboardKpis {
    pub active_sessions: i64,
    pub active_agents: i64,
    pub running_subtasks: i64,
    pub actions_last_hour: i64,
    pub error_rate_last_hour: Option<f64>,
    pub unread_messages: i64,
}

pub async fn dashboard_kpis(pool: &PgPool) -> Result<DashboardKpis, StoreError> {
    let kpis = sqlx::query_as::<_, DashboardKpis>(
        r#"SELECT (SELECT count(*) FROM sessions WHERE ended_at IS NULL) AS active_sessions,
                  (SELECT count(*) FROM active_agents) AS active_agents,
                  (SELECT count(*) FROM subtasks WHERE status = 'running') AS running_subtasks,
                  (SELECT count(*) FROM actions
                    WHERE created_at > now() - interval '1 hour') AS actions_last_hour,
                  (SELECT avg(CASE WHEN exit_code IS NOT NULL AND exit_code <> 0
                                   THEN 1.0 ELSE 0.0 END)::float8
                     FROM actions
                    WHERE created_at > now() - interval '1 hour') AS error_rate_last_hour,
                  (SELECT count(*) FROM unread_messages WHERE reader_count = 0) AS unread_messages"#,
    )
    .fetch_one(pool)
    .await?;
    Ok(kpis)
}

/// The bridge's periodic aggregate, broadcast as one `metric.update` event.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MetricsSnapshot {
    pub active_sessions: i64,
    pub active_agents: i64,
    pub pending_tasks: i64,
    pub running_tasks: i64,
    pub messages_last_hour: i64,
    pub actions_per_minute: Option<f64>,
    pub avg_task_duration_ms: Option<f64>,
}

pub async fn metrics_snapshot(pool: &PgPool) -> Result<MetricsSnapshot, StoreError> {
    let snapshot = sqlx::query_as::<_, MetricsSnapshot>(
        r#"SELECT (SELECT count(*) FROM sessions WHERE ended_at IS NULL) AS active_sessions,
                  (SELECT count(*) FROM active_agents) AS active_agents,
                  (SELECT count(*) FROM subtasks WHERE status = 'pending') AS pending_tasks,
                  (SELECT count(*) FROM subtasks WHERE status = 'running') AS running_tasks,
                  (SELECT count(*) FROM agent_messages
                    WHERE created_at > now() - interval '1 hour') AS messages_last_hour,
                  (SELECT count(*)::float8 / 60.0 FROM actions
                    WHERE created_at > now() - interval '1 hour') AS actions_per_minute,
                  (SELECT avg(extract(epoch FROM (completed_at - started_at)) * 1000.0)::float8
                     FROM subtasks
                    WHERE completed_at IS NOT NULL AND started_at IS NOT NULL) AS avg_task_duration_ms"#,
    )
    .fetch_one(pool)
    .await?;
    Ok(snapshot)
}

/// The full nested tree for one project in a single statement.
///
/// Levels are ordered by `wave_number` then `created_at`; requests by
/// `created_at`.
pub async fn hierarchy(pool: &PgPool, project_id: Uuid) -> Result<serde_json::Value, StoreError> {
    let tree: serde_json::Value = sqlx::query_scalar(
        r#"SELECT jsonb_build_object(
               'id', p.id,
               'path', p.path,
               'name', p.name,
               'created_at', p.created_at,
               'requests', COALESCE((
                   SELECT jsonb_agg(jsonb_build_object(
                       'id', r.id,
                       'session_id', r.session_id,
                       'prompt', r.prompt,
                       'prompt_type', r.prompt_type,
                       'status', r.status,
                       'created_at', r.created_at,
                       'tasks', COALESCE((
                           SELECT jsonb_agg(jsonb_build_object(
                               'id', t.id,
                               'name', t.name,
                               'wave_number', t.wave_number,
                               'status', t.status,
                               'created_at', t.created_at,
                               'subtasks', COALESCE((
                                   SELECT jsonb_agg(jsonb_build_object(
                                       'id', st.id,
                                       'description', st.description,
                                       'status', st.status,
                                       'agent_type', st.agent_type,
                                       'agent_id', st.agent_id,
                                       'blocked_by', st.blocked_by,
                                       'created_at', st.created_at
                                   ) ORDER BY st.created_at ASC)
                                   FROM subtasks st WHERE st.task_id = t.id
                               ), '[]'::jsonb)
                           ) ORDER BY t.wave_number ASC, t.created_at ASC)
                           FROM tasks t WHERE t.request_id = r.id
                       ), '[]'::jsonb)
                   ) ORDER BY r.created_at ASC)
                   FROM requests r WHERE r.project_id = p.id
               ), '[]'::jsonb)
           )
           FROM projects p WHERE p.id = $1"#,
    )
    .bind(project_id)
    .fetch_one(pool)
    .await
    .map_err(StoreError::on_missing("project"))?;
    Ok(tree)
}
