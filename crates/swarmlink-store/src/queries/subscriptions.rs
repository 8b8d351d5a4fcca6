// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Topic subscriptions. Pure metadata for the REST path; the bridge reads
//! them to auto-route reconnected clients onto their agent channels.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::Subscription;

/// Upsert on the natural key (agent_id, topic).
pub async fn upsert(
    pool: &PgPool,
    agent_id: &str,
    topic: &str,
    callback_url: Option<&str>,
) -> Result<Subscription, StoreError> {
    let sub = sqlx::query_as::<_, Subscription>(
        r#"INSERT INTO subscriptions (agent_id, topic, callback_url)
           VALUES ($1, $2, $3)
           ON CONFLICT (agent_id, topic) DO UPDATE SET
               callback_url = EXCLUDED.callback_url
           RETURNING *"#,
    )
    .bind(agent_id)
    .bind(topic)
    .bind(callback_url)
    .fetch_one(pool)
    .await?;
    Ok(sub)
}

pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Subscription>, StoreError> {
    let rows = sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn for_agent(pool: &PgPool, agent_id: &str) -> Result<Vec<Subscription>, StoreError> {
    let rows = sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions WHERE agent_id = $1 ORDER BY topic ASC",
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("subscription"));
    }
    Ok(())
}

/// Remove by natural key (`POST /unsubscribe`). Missing rows are fine —
/// unsubscribe is idempotent.
pub async fn delete_by_key(pool: &PgPool, agent_id: &str, topic: &str) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE agent_id = $1 AND topic = $2")
        .bind(agent_id)
        .bind(topic)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
