// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Tasks (waves): sibling groups of subtasks inside a request.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Task, TaskStatus};

/// Create a task. When `wave_number` is omitted it auto-increments within
/// the owning request (max + 1, starting at 0).
pub async fn create(
    pool: &PgPool,
    request_id: Uuid,
    name: &str,
    wave_number: Option<i32>,
) -> Result<Task, StoreError> {
    let result = sqlx::query_as::<_, Task>(
        r#"INSERT INTO tasks (request_id, name, wave_number)
           VALUES ($1, $2, COALESCE(
               $3,
               (SELECT COALESCE(max(wave_number) + 1, 0) FROM tasks WHERE request_id = $1)
           ))
           RETURNING *"#,
    )
    .bind(request_id)
    .bind(name)
    .bind(wave_number)
    .fetch_one(pool)
    .await;

    result.map_err(|e| {
        let wrapped = StoreError::from(e);
        if wrapped.is_fk_violation() {
            StoreError::not_found("request")
        } else {
            wrapped
        }
    })
}

pub async fn list(
    pool: &PgPool,
    request_id: Option<Uuid>,
    status: Option<TaskStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Task>, StoreError> {
    let rows = sqlx::query_as::<_, Task>(
        r#"SELECT * FROM tasks
           WHERE ($1::uuid IS NULL OR request_id = $1)
             AND ($2::text IS NULL OR status = $2)
           ORDER BY wave_number ASC, created_at ASC
           LIMIT $3 OFFSET $4"#,
    )
    .bind(request_id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Task, StoreError> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(StoreError::on_missing("task"))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTask {
    pub name: Option<String>,
    pub status: Option<TaskStatus>,
    pub wave_number: Option<i32>,
}

pub async fn update(pool: &PgPool, id: Uuid, patch: &UpdateTask) -> Result<Task, StoreError> {
    let terminal = patch.status.map(|s| s.is_terminal()).unwrap_or(false);
    let task = sqlx::query_as::<_, Task>(
        r#"UPDATE tasks SET
               name = COALESCE($2, name),
               status = COALESCE($3, status),
               wave_number = COALESCE($4, wave_number),
               completed_at = CASE WHEN $5 THEN COALESCE(completed_at, now())
                                   ELSE completed_at END
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(patch.name.as_deref())
    .bind(patch.status)
    .bind(patch.wave_number)
    .bind(terminal)
    .fetch_one(pool)
    .await
    .map_err(StoreError::on_missing("task"))?;
    Ok(task)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("task"));
    }
    Ok(())
}
