// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Agent blocking assertions: `blocked` must not proceed while a row
//! (blocker, blocked) exists.

use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::Blocking;

/// Upsert on (blocker, blocked). A self-block is a caller error, rejected
/// before touching the database.
pub async fn upsert(
    pool: &PgPool,
    blocker: &str,
    blocked: &str,
    reason: Option<&str>,
) -> Result<Blocking, StoreError> {
    if blocker == blocked {
        return Err(StoreError::InvalidReference(
            "an agent cannot block itself".to_string(),
        ));
    }
    let row = sqlx::query_as::<_, Blocking>(
        r#"INSERT INTO agent_blocking (blocker, blocked, reason)
           VALUES ($1, $2, $3)
           ON CONFLICT (blocker, blocked) DO UPDATE SET
               reason = EXCLUDED.reason
           RETURNING *"#,
    )
    .bind(blocker)
    .bind(blocked)
    .bind(reason)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// All blockings touching an agent, in both directions.
pub async fn for_agent(pool: &PgPool, agent_id: &str) -> Result<Vec<Blocking>, StoreError> {
    let rows = sqlx::query_as::<_, Blocking>(
        r#"SELECT * FROM agent_blocking
           WHERE blocker = $1 OR blocked = $1
           ORDER BY created_at DESC"#,
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Blockings that stop `agent_id` from proceeding, for the brief generator.
pub async fn blocking_agent(pool: &PgPool, agent_id: &str) -> Result<Vec<Blocking>, StoreError> {
    let rows = sqlx::query_as::<_, Blocking>(
        "SELECT * FROM agent_blocking WHERE blocked = $1 ORDER BY created_at DESC",
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn check(pool: &PgPool, blocker: &str, blocked: &str) -> Result<bool, StoreError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM agent_blocking WHERE blocker = $1 AND blocked = $2)",
    )
    .bind(blocker)
    .bind(blocked)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Remove every blocking that holds `blocked_id` back.
pub async fn release_blocked(pool: &PgPool, blocked_id: &str) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM agent_blocking WHERE blocked = $1")
        .bind(blocked_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Remove one specific (blocker, blocked) edge (`POST /unblock`).
pub async fn unblock(pool: &PgPool, blocker: &str, blocked: &str) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM agent_blocking WHERE blocker = $1 AND blocked = $2")
        .bind(blocker)
        .bind(blocked)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
