// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Inter-agent pub/sub messages.
//!
//! Delivery is read-and-mark in one statement: the deliver query appends
//! the reader to `read_by` while returning the rows, so a second call
//! immediately after returns nothing new. Broadcast messages (null
//! `to_agent`) are marked per-reader the same way.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::AgentMessage;

/// TTL bounds: 1 second to 24 hours.
pub const TTL_MIN_SECS: i64 = 1;
pub const TTL_MAX_SECS: i64 = 86_400;

pub fn clamp_ttl(ttl_seconds: i64) -> i64 {
    ttl_seconds.clamp(TTL_MIN_SECS, TTL_MAX_SECS)
}

pub fn clamp_priority(priority: i64) -> i32 {
    priority.clamp(0, 10) as i32
}

/// Insert a message inside the caller's transaction (used by the subtask
/// completion path so the broadcast commits with the transition).
pub async fn insert_in_tx(
    conn: &mut PgConnection,
    from_agent: &str,
    to_agent: Option<&str>,
    topic: &str,
    payload: &serde_json::Value,
    priority: i32,
    ttl_seconds: i64,
) -> Result<AgentMessage, StoreError> {
    let expires_at = Utc::now() + Duration::seconds(clamp_ttl(ttl_seconds));
    let message = sqlx::query_as::<_, AgentMessage>(
        r#"INSERT INTO agent_messages (from_agent, to_agent, topic, payload, priority, expires_at)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING *"#,
    )
    .bind(from_agent)
    .bind(to_agent)
    .bind(topic)
    .bind(payload)
    .bind(priority)
    .bind(expires_at)
    .fetch_one(conn)
    .await?;
    Ok(message)
}

/// Deliver unread, unexpired messages addressed to `agent_id` or broadcast,
/// marking the reader atomically. Ordered by (priority desc, created_at asc).
pub async fn deliver(
    pool: &PgPool,
    agent_id: &str,
    topic: Option<&str>,
    since: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<AgentMessage>, StoreError> {
    let mut rows = sqlx::query_as::<_, AgentMessage>(
        r#"WITH picked AS (
               SELECT id FROM agent_messages
               WHERE (to_agent = $1 OR to_agent IS NULL)
                 AND expires_at > now()
                 AND NOT (read_by @> ARRAY[$1])
                 AND ($2::text IS NULL OR topic = $2)
                 AND ($3::timestamptz IS NULL OR created_at > $3)
               ORDER BY priority DESC, created_at ASC
               LIMIT $4
               FOR UPDATE SKIP LOCKED
           )
           UPDATE agent_messages m
           SET read_by = array_append(m.read_by, $1)
           FROM picked
           WHERE m.id = picked.id
           RETURNING m.*"#,
    )
    .bind(agent_id)
    .bind(topic)
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    // UPDATE ... RETURNING row order is unspecified; restore delivery order.
    rows.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
    });
    Ok(rows)
}

/// Unfiltered listing for operators (`GET /messages`).
pub async fn list(
    pool: &PgPool,
    topic: Option<&str>,
    from_agent: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<AgentMessage>, StoreError> {
    let rows = sqlx::query_as::<_, AgentMessage>(
        r#"SELECT * FROM agent_messages
           WHERE ($1::text IS NULL OR topic = $1)
             AND ($2::text IS NULL OR from_agent = $2)
           ORDER BY created_at DESC
           LIMIT $3 OFFSET $4"#,
    )
    .bind(topic)
    .bind(from_agent)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Unread messages for the brief generator — same selection as [`deliver`]
/// but without marking readers (the brief must not consume the queue).
pub async fn peek_unread(
    pool: &PgPool,
    agent_id: &str,
    limit: i64,
) -> Result<Vec<AgentMessage>, StoreError> {
    let rows = sqlx::query_as::<_, AgentMessage>(
        r#"SELECT * FROM agent_messages
           WHERE (to_agent = $1 OR to_agent IS NULL)
             AND expires_at > now()
             AND NOT (read_by @> ARRAY[$1])
           ORDER BY priority DESC, created_at ASC
           LIMIT $2"#,
    )
    .bind(agent_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// One sweep of the expiry cleaner.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SweepResult {
    pub expired_deleted: u64,
    pub read_deleted: u64,
}

/// Delete expired messages, plus targeted messages already read by their
/// addressee more than an hour ago (they can never be delivered again).
pub async fn sweep(pool: &PgPool) -> Result<SweepResult, StoreError> {
    let expired = sqlx::query("DELETE FROM agent_messages WHERE expires_at < now()")
        .execute(pool)
        .await?
        .rows_affected();

    let read = sqlx::query(
        r#"DELETE FROM agent_messages
           WHERE to_agent IS NOT NULL
             AND read_by @> ARRAY[to_agent]
             AND created_at < now() - interval '1 hour'"#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    Ok(SweepResult {
        expired_deleted: expired,
        read_deleted: read,
    })
}

/// Delete a message by id (operator cleanup).
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM agent_messages WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("message"));
    }
    Ok(())
}
