// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Requests: one row per user prompt.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{PromptType, Request, RequestStatus};

pub async fn create(
    pool: &PgPool,
    project_id: Uuid,
    session_id: &str,
    prompt: &str,
    prompt_type: PromptType,
    metadata: &serde_json::Value,
) -> Result<Request, StoreError> {
    let result = sqlx::query_as::<_, Request>(
        r#"INSERT INTO requests (project_id, session_id, prompt, prompt_type, metadata)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING *"#,
    )
    .bind(project_id)
    .bind(session_id)
    .bind(prompt)
    .bind(prompt_type)
    .bind(metadata)
    .fetch_one(pool)
    .await;

    result.map_err(|e| {
        let wrapped = StoreError::from(e);
        if wrapped.is_fk_violation() {
            // Which parent is missing is in the constraint name.
            match &wrapped {
                StoreError::Sqlx(sqlx::Error::Database(db))
                    if db.constraint().is_some_and(|c| c.contains("session")) =>
                {
                    StoreError::not_found("session")
                }
                _ => StoreError::not_found("project"),
            }
        } else {
            wrapped
        }
    })
}

pub async fn list(
    pool: &PgPool,
    project_id: Option<Uuid>,
    session_id: Option<&str>,
    status: Option<RequestStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Request>, StoreError> {
    let rows = sqlx::query_as::<_, Request>(
        r#"SELECT * FROM requests
           WHERE ($1::uuid IS NULL OR project_id = $1)
             AND ($2::text IS NULL OR session_id = $2)
             AND ($3::text IS NULL OR status = $3)
           ORDER BY created_at DESC
           LIMIT $4 OFFSET $5"#,
    )
    .bind(project_id)
    .bind(session_id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Request, StoreError> {
    sqlx::query_as::<_, Request>("SELECT * FROM requests WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(StoreError::on_missing("request"))
}

/// Partial update; a terminal status stamps `completed_at` exactly once.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    pub status: Option<RequestStatus>,
    pub prompt_type: Option<PromptType>,
    pub metadata: Option<serde_json::Value>,
}

pub async fn update(pool: &PgPool, id: Uuid, patch: &UpdateRequest) -> Result<Request, StoreError> {
    let terminal = patch.status.map(|s| s.is_terminal()).unwrap_or(false);
    let request = sqlx::query_as::<_, Request>(
        r#"UPDATE requests SET
               status = COALESCE($2, status),
               prompt_type = COALESCE($3, prompt_type),
               metadata = metadata || COALESCE($4, '{}'::jsonb),
               completed_at = CASE WHEN $5 THEN COALESCE(completed_at, now())
                                   ELSE completed_at END
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(patch.status)
    .bind(patch.prompt_type)
    .bind(patch.metadata.as_ref())
    .bind(terminal)
    .fetch_one(pool)
    .await
    .map_err(StoreError::on_missing("request"))?;
    Ok(request)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM requests WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("request"));
    }
    Ok(())
}
