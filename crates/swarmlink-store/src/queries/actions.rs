// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Action ingest and queries.
//!
//! [`ingest`] is the hot path hook clients hit on every tool invocation.
//! One transaction performs the whole group: project upsert by path,
//! session upsert with counter increments, the action insert (blobs gzip
//! packed above 1 KiB), keyword-score upserts, and the `action.created`
//! notification. Postgres delivers the NOTIFY after commit, so the caller
//! gets its response without waiting for any fan-out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use swarmlink_proto::{Channel, Notification};

use crate::compress;
use crate::error::StoreError;
use crate::keywords;
use crate::models::{Action, ToolType};
use crate::notify;
use crate::queries::{projects, routing, sessions};

/// Raw row shape; input/output are unpacked into [`Action`] on read.
#[derive(sqlx::FromRow)]
struct ActionRow {
    id: Uuid,
    subtask_id: Option<Uuid>,
    session_id: Option<String>,
    tool_name: String,
    tool_type: ToolType,
    input_data: Option<Vec<u8>>,
    input_compressed: bool,
    output_data: Option<Vec<u8>>,
    output_compressed: bool,
    file_paths: Vec<String>,
    exit_code: Option<i32>,
    duration_ms: Option<i32>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl ActionRow {
    fn into_action(self) -> Action {
        let input = self
            .input_data
            .as_deref()
            .and_then(|d| compress::unpack(d, self.input_compressed));
        let output = self
            .output_data
            .as_deref()
            .and_then(|d| compress::unpack(d, self.output_compressed));
        Action {
            id: self.id,
            subtask_id: self.subtask_id,
            session_id: self.session_id,
            tool_name: self.tool_name,
            tool_type: self.tool_type,
            input,
            output,
            file_paths: self.file_paths,
            exit_code: self.exit_code,
            duration_ms: self.duration_ms,
            metadata: self.metadata,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IngestAction {
    pub tool_name: String,
    pub tool_type: ToolType,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub subtask_id: Option<Uuid>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub duration_ms: Option<i32>,
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

fn default_metadata() -> serde_json::Value {
    json!({})
}

#[derive(Debug, Serialize)]
pub struct IngestOutcome {
    pub action: Action,
    pub project_id: Option<Uuid>,
    pub keywords: Vec<String>,
}

/// The whole ingest group, atomically.
pub async fn ingest(pool: &PgPool, req: &IngestAction) -> Result<IngestOutcome, StoreError> {
    let success = req.exit_code.unwrap_or(0) == 0;
    let mut tx = pool.begin().await?;

    let project_id = match req.project_path.as_deref() {
        Some(path) => Some(projects::upsert(&mut *tx, path, None, &json!({})).await?.id),
        None => None,
    };

    if let Some(session_id) = req.session_id.as_deref() {
        sessions::upsert_with_counters(&mut *tx, session_id, project_id, success).await?;
    }

    let (input_data, input_compressed) = match req.input.as_deref() {
        Some(text) => {
            let (bytes, packed) = compress::pack(text);
            (Some(bytes), packed)
        }
        None => (None, false),
    };
    let (output_data, output_compressed) = match req.output.as_deref() {
        Some(text) => {
            let (bytes, packed) = compress::pack(text);
            (Some(bytes), packed)
        }
        None => (None, false),
    };

    let row = sqlx::query_as::<_, ActionRow>(
        r#"INSERT INTO actions (subtask_id, session_id, tool_name, tool_type,
                                input_data, input_compressed, output_data, output_compressed,
                                file_paths, exit_code, duration_ms, metadata)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
           RETURNING *"#,
    )
    .bind(req.subtask_id)
    .bind(req.session_id.as_deref())
    .bind(&req.tool_name)
    .bind(req.tool_type)
    .bind(input_data.as_deref())
    .bind(input_compressed)
    .bind(output_data.as_deref())
    .bind(output_compressed)
    .bind(&req.file_paths)
    .bind(req.exit_code)
    .bind(req.duration_ms)
    .bind(&req.metadata)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        let wrapped = StoreError::from(e);
        if wrapped.is_fk_violation() {
            StoreError::not_found("subtask")
        } else {
            wrapped
        }
    })?;

    let keywords = keywords::extract_keywords(&req.tool_name, req.input.as_deref());
    routing::record_usage(&mut tx, &keywords, &req.tool_name, req.tool_type, success).await?;

    let action = row.into_action();
    let notification = Notification::new(
        Channel::Global,
        "action.created",
        json!({
            "action_id": action.id,
            "tool_name": action.tool_name,
            "tool_type": action.tool_type,
            "session_id": action.session_id,
            "subtask_id": action.subtask_id,
            "exit_code": action.exit_code,
        }),
    );
    notify::emit(&mut *tx, &notification).await?;

    tx.commit().await?;
    Ok(IngestOutcome {
        action,
        project_id,
        keywords,
    })
}

/// Action listing caps at 5000 (the one pagination exception).
pub async fn list(
    pool: &PgPool,
    session_id: Option<&str>,
    subtask_id: Option<Uuid>,
    tool_name: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Action>, StoreError> {
    let rows = sqlx::query_as::<_, ActionRow>(
        r#"SELECT * FROM actions
           WHERE ($1::text IS NULL OR session_id = $1)
             AND ($2::uuid IS NULL OR subtask_id = $2)
             AND ($3::text IS NULL OR tool_name = $3)
           ORDER BY created_at DESC
           LIMIT $4 OFFSET $5"#,
    )
    .bind(session_id)
    .bind(subtask_id)
    .bind(tool_name)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(ActionRow::into_action).collect())
}

/// Most recent actions for a session, for the brief generator.
pub async fn recent_for_session(
    pool: &PgPool,
    session_id: &str,
    limit: i64,
) -> Result<Vec<Action>, StoreError> {
    list(pool, Some(session_id), None, None, limit, 0).await
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct HourlyBucket {
    pub hour: DateTime<Utc>,
    pub count: i64,
    pub errors: i64,
}

/// Per-hour action counts over the last 24 hours, off the `actions_full`
/// view (blob columns are not needed here).
pub async fn hourly(pool: &PgPool) -> Result<Vec<HourlyBucket>, StoreError> {
    let rows = sqlx::query_as::<_, HourlyBucket>(
        r#"SELECT date_trunc('hour', created_at) AS hour,
                  count(*) AS count,
                  count(*) FILTER (WHERE exit_code IS NOT NULL AND exit_code <> 0) AS errors
           FROM actions_full
           WHERE created_at > now() - interval '24 hours'
           GROUP BY 1
           ORDER BY 1 ASC"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM actions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("action"));
    }
    Ok(())
}

/// Bulk delete for a session; returns how many rows went away.
pub async fn delete_by_session(pool: &PgPool, session_id: &str) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM actions WHERE session_id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
