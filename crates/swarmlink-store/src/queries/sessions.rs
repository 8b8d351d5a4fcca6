// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Sessions: client-named, strict on create, counter-bearing.
//!
//! The counters (`total_tools_used`, `total_success`, `total_errors`) are
//! only ever written by the action ingest path, atomically with the action
//! insert — see `queries::actions::ingest`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::Session;

/// Strict create: a duplicate id is a conflict, never an update.
pub async fn create(
    pool: &PgPool,
    id: &str,
    project_id: Option<Uuid>,
    metadata: &serde_json::Value,
) -> Result<Session, StoreError> {
    let result = sqlx::query_as::<_, Session>(
        r#"INSERT INTO sessions (id, project_id, metadata)
           VALUES ($1, $2, $3)
           RETURNING *"#,
    )
    .bind(id)
    .bind(project_id)
    .bind(metadata)
    .fetch_one(pool)
    .await;

    match result {
        Ok(session) => Ok(session),
        Err(e) => {
            let wrapped = StoreError::from(e);
            if wrapped.is_unique_violation() {
                Err(StoreError::Conflict(format!("session {id:?} already exists")))
            } else if wrapped.is_fk_violation() {
                Err(StoreError::not_found("project"))
            } else {
                Err(wrapped)
            }
        }
    }
}

/// Upsert used by the ingest path: creates the session on first sight and
/// bumps the counters in the same statement. `success` branches on the
/// action's exit code.
pub async fn upsert_with_counters(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    project_id: Option<Uuid>,
    success: bool,
) -> Result<Session, StoreError> {
    let (succ, err) = if success { (1i32, 0i32) } else { (0i32, 1i32) };
    let session = sqlx::query_as::<_, Session>(
        r#"INSERT INTO sessions (id, project_id, total_tools_used, total_success, total_errors)
           VALUES ($1, $2, 1, $3, $4)
           ON CONFLICT (id) DO UPDATE SET
               total_tools_used = sessions.total_tools_used + 1,
               total_success = sessions.total_success + EXCLUDED.total_success,
               total_errors = sessions.total_errors + EXCLUDED.total_errors,
               project_id = COALESCE(sessions.project_id, EXCLUDED.project_id)
           RETURNING *"#,
    )
    .bind(id)
    .bind(project_id)
    .bind(succ)
    .bind(err)
    .fetch_one(executor)
    .await?;
    Ok(session)
}

pub async fn list(
    pool: &PgPool,
    project_id: Option<Uuid>,
    active_only: bool,
    limit: i64,
    offset: i64,
) -> Result<Vec<Session>, StoreError> {
    let rows = sqlx::query_as::<_, Session>(
        r#"SELECT * FROM sessions
           WHERE ($1::uuid IS NULL OR project_id = $1)
             AND (NOT $2 OR ended_at IS NULL)
           ORDER BY started_at DESC
           LIMIT $3 OFFSET $4"#,
    )
    .bind(project_id)
    .bind(active_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: &str) -> Result<Session, StoreError> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(StoreError::on_missing("session"))
}

/// Partial update. `ended: true` stamps `ended_at` exactly once; metadata
/// is shallow-merged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSession {
    pub ended: Option<bool>,
    pub project_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

pub async fn update(pool: &PgPool, id: &str, patch: &UpdateSession) -> Result<Session, StoreError> {
    let session = sqlx::query_as::<_, Session>(
        r#"UPDATE sessions SET
               ended_at = CASE WHEN $2 THEN COALESCE(ended_at, now()) ELSE ended_at END,
               project_id = COALESCE($3, project_id),
               metadata = metadata || COALESCE($4, '{}'::jsonb)
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(patch.ended.unwrap_or(false))
    .bind(patch.project_id)
    .bind(patch.metadata.as_ref())
    .fetch_one(pool)
    .await
    .map_err(StoreError::on_missing("session"))?;
    Ok(session)
}

/// Merge the compaction marker into the session's metadata.
pub async fn mark_compacted(
    pool: &PgPool,
    id: &str,
    agent_id: &str,
    summary: Option<&str>,
) -> Result<Session, StoreError> {
    let marker = serde_json::json!({
        "compacted": true,
        "compacted_at": Utc::now(),
        "compact_agent": agent_id,
        "compact_summary": summary,
    });
    sqlx::query_as::<_, Session>(
        "UPDATE sessions SET metadata = metadata || $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(marker)
    .fetch_one(pool)
    .await
    .map_err(StoreError::on_missing("session"))
}

pub async fn delete(pool: &PgPool, id: &str) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("session"));
    }
    Ok(())
}

/// Sessions with no `ended_at`, newest first, with their project path.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct ActiveSession {
    pub id: String,
    pub project_id: Option<Uuid>,
    pub project_path: Option<String>,
    pub started_at: DateTime<Utc>,
    pub total_tools_used: i32,
    pub total_success: i32,
    pub total_errors: i32,
}

pub async fn active(pool: &PgPool, limit: i64) -> Result<Vec<ActiveSession>, StoreError> {
    let rows = sqlx::query_as::<_, ActiveSession>(
        r#"SELECT s.id, s.project_id, p.path AS project_path, s.started_at,
                  s.total_tools_used, s.total_success, s.total_errors
           FROM sessions s
           LEFT JOIN projects p ON p.id = s.project_id
           WHERE s.ended_at IS NULL
           ORDER BY s.started_at DESC
           LIMIT $1"#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Aggregates for `GET /sessions/stats`.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct SessionStats {
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub total_tools_used: i64,
    pub total_success: i64,
    pub total_errors: i64,
}

pub async fn stats(pool: &PgPool) -> Result<SessionStats, StoreError> {
    let stats = sqlx::query_as::<_, SessionStats>(
        r#"SELECT count(*)                                   AS total_sessions,
                  count(*) FILTER (WHERE ended_at IS NULL)   AS active_sessions,
                  COALESCE(sum(total_tools_used), 0)::bigint AS total_tools_used,
                  COALESCE(sum(total_success), 0)::bigint    AS total_success,
                  COALESCE(sum(total_errors), 0)::bigint     AS total_errors
           FROM sessions"#,
    )
    .fetch_one(pool)
    .await?;
    Ok(stats)
}
