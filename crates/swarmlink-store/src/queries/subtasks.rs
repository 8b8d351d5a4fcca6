// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Subtasks: the unit of agent work.
//!
//! Status may move freely between any two values (monotonicity is not
//! enforced), but the timestamp side effects are one-shot: `started_at` is
//! stamped on the first transition to `running`, `completed_at` on the
//! first terminal transition. The transition report tells the API layer
//! which broadcast side effects to perform in the same transaction.

use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Subtask, SubtaskStatus};

/// Verify that every id in `blocked_by` names an existing subtask.
pub async fn validate_blocked_by(
    conn: &mut PgConnection,
    blocked_by: &[Uuid],
) -> Result<(), StoreError> {
    if blocked_by.is_empty() {
        return Ok(());
    }
    let found: i64 =
        sqlx::query_scalar("SELECT count(*) FROM subtasks WHERE id = ANY($1)")
            .bind(blocked_by)
            .fetch_one(conn)
            .await?;
    if found as usize != blocked_by.len() {
        return Err(StoreError::InvalidReference(
            "blocked_by references a non-existent subtask".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateSubtask {
    pub task_id: Uuid,
    pub description: String,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub blocked_by: Vec<Uuid>,
    #[serde(default)]
    pub context_snapshot: Option<serde_json::Value>,
}

pub async fn create(pool: &PgPool, req: &CreateSubtask) -> Result<Subtask, StoreError> {
    let mut tx = pool.begin().await?;
    validate_blocked_by(&mut tx, &req.blocked_by).await?;

    let result = sqlx::query_as::<_, Subtask>(
        r#"INSERT INTO subtasks (task_id, description, agent_type, agent_id, blocked_by,
                                 context_snapshot, status)
           VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN cardinality($5::uuid[]) > 0
                                                THEN 'blocked' ELSE 'pending' END)
           RETURNING *"#,
    )
    .bind(req.task_id)
    .bind(&req.description)
    .bind(req.agent_type.as_deref())
    .bind(req.agent_id.as_deref())
    .bind(&req.blocked_by)
    .bind(req.context_snapshot.as_ref())
    .fetch_one(&mut *tx)
    .await;

    let subtask = result.map_err(|e| {
        let wrapped = StoreError::from(e);
        if wrapped.is_fk_violation() {
            StoreError::not_found("task")
        } else {
            wrapped
        }
    })?;

    tx.commit().await?;
    Ok(subtask)
}

pub async fn list(
    pool: &PgPool,
    task_id: Option<Uuid>,
    agent_id: Option<&str>,
    status: Option<SubtaskStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Subtask>, StoreError> {
    let rows = sqlx::query_as::<_, Subtask>(
        r#"SELECT * FROM subtasks
           WHERE ($1::uuid IS NULL OR task_id = $1)
             AND ($2::text IS NULL OR agent_id = $2)
             AND ($3::text IS NULL OR status = $3)
           ORDER BY created_at ASC
           LIMIT $4 OFFSET $5"#,
    )
    .bind(task_id)
    .bind(agent_id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Subtask, StoreError> {
    sqlx::query_as::<_, Subtask>("SELECT * FROM subtasks WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(StoreError::on_missing("subtask"))
}

/// Subtasks an agent is actively working (running/paused/blocked), for the
/// brief generator.
pub async fn active_for_agent(
    pool: &PgPool,
    agent_id: &str,
    agent_type: Option<&str>,
) -> Result<Vec<Subtask>, StoreError> {
    let rows = sqlx::query_as::<_, Subtask>(
        r#"SELECT * FROM subtasks
           WHERE status IN ('running', 'paused', 'blocked')
             AND (agent_id = $1 OR ($2::text IS NOT NULL AND agent_type = $2))
           ORDER BY created_at ASC"#,
    )
    .bind(agent_id)
    .bind(agent_type)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSubtask {
    pub status: Option<SubtaskStatus>,
    pub description: Option<String>,
    pub agent_type: Option<String>,
    pub agent_id: Option<String>,
    pub blocked_by: Option<Vec<Uuid>>,
    pub context_snapshot: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
}

/// What a status change did, so the caller can emit matching events and
/// messages inside the same transaction.
#[derive(Debug, Clone, Copy)]
pub struct SubtaskTransition {
    pub previous: SubtaskStatus,
    pub became_running: bool,
    pub became_terminal: bool,
}

/// Apply a partial update inside the caller's transaction.
pub async fn update_in_tx(
    conn: &mut PgConnection,
    id: Uuid,
    patch: &UpdateSubtask,
) -> Result<(Subtask, SubtaskTransition), StoreError> {
    let previous = sqlx::query_as::<_, Subtask>("SELECT * FROM subtasks WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(StoreError::on_missing("subtask"))?;

    if let Some(blocked_by) = &patch.blocked_by {
        validate_blocked_by(conn, blocked_by).await?;
    }

    let next = patch.status.unwrap_or(previous.status);
    let to_running = next == SubtaskStatus::Running && previous.status != SubtaskStatus::Running;
    let to_terminal = next.is_terminal() && !previous.status.is_terminal();

    let subtask = sqlx::query_as::<_, Subtask>(
        r#"UPDATE subtasks SET
               status = $2,
               description = COALESCE($3, description),
               agent_type = COALESCE($4, agent_type),
               agent_id = COALESCE($5, agent_id),
               blocked_by = COALESCE($6, blocked_by),
               context_snapshot = COALESCE($7, context_snapshot),
               result = COALESCE($8, result),
               started_at = CASE WHEN $9 THEN COALESCE(started_at, now()) ELSE started_at END,
               completed_at = CASE WHEN $10 THEN COALESCE(completed_at, now()) ELSE completed_at END
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(next)
    .bind(patch.description.as_deref())
    .bind(patch.agent_type.as_deref())
    .bind(patch.agent_id.as_deref())
    .bind(patch.blocked_by.as_ref())
    .bind(patch.context_snapshot.as_ref())
    .bind(patch.result.as_ref())
    .bind(next == SubtaskStatus::Running)
    .bind(next.is_terminal())
    .fetch_one(conn)
    .await?;

    Ok((
        subtask,
        SubtaskTransition {
            previous: previous.status,
            became_running: to_running,
            became_terminal: to_terminal,
        },
    ))
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM subtasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("subtask"));
    }
    Ok(())
}
