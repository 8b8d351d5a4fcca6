// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The adaptive keyword→tool index.
//!
//! All counter math happens in SQL under `ON CONFLICT`, so concurrent API
//! workers resolve through row-level conflict handling — there is no
//! in-memory accumulator to keep coherent. The score formula here mirrors
//! `keywords::score_for`; both sides are clamped to [0.1, 5.0].

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::error::StoreError;
use crate::models::ToolType;

/// Implicit update from the ingest path: bump usage (and success) for every
/// (keyword, tool) pair and recompute the score atomically.
pub async fn record_usage(
    conn: &mut PgConnection,
    keywords: &[String],
    tool_name: &str,
    tool_type: ToolType,
    success: bool,
) -> Result<(), StoreError> {
    let succ = i32::from(success);
    let initial = crate::keywords::score_for(succ as i64, 1);

    for keyword in keywords {
        sqlx::query(
            r#"INSERT INTO keyword_tool_scores
                   (keyword, tool_name, tool_type, score, usage_count, success_count, last_used)
               VALUES ($1, $2, $3, $4, 1, $5, now())
               ON CONFLICT (keyword, tool_name) DO UPDATE SET
                   usage_count = keyword_tool_scores.usage_count + 1,
                   success_count = keyword_tool_scores.success_count + $5,
                   tool_type = EXCLUDED.tool_type,
                   last_used = now(),
                   score = LEAST(5.0, GREATEST(0.1,
                       0.25
                       + 3.0 * (keyword_tool_scores.success_count + $5)::real
                             / (keyword_tool_scores.usage_count + 1)::real
                       + 0.35 * ln((keyword_tool_scores.usage_count + 2)::real)
                   ))"#,
        )
        .bind(keyword)
        .bind(tool_name)
        .bind(tool_type)
        .bind(initial)
        .bind(succ)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Explicit feedback: +0.2 when the suggestion was chosen, −0.1 when it was
/// rejected, clamped in SQL. Returns how many rows matched.
pub async fn apply_feedback(
    pool: &PgPool,
    tool_name: &str,
    keywords: &[String],
    chosen: bool,
) -> Result<u64, StoreError> {
    let delta: f32 = if chosen { 0.2 } else { -0.1 };
    let result = sqlx::query(
        r#"UPDATE keyword_tool_scores
           SET score = LEAST(5.0, GREATEST(0.1, score + $3)),
               last_used = now()
           WHERE tool_name = $1 AND keyword = ANY($2)"#,
    )
    .bind(tool_name)
    .bind(keywords)
    .bind(delta)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// One suggested tool, aggregated over the keywords it matched.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Suggestion {
    pub tool_name: String,
    pub tool_type: ToolType,
    pub match_count: i64,
    pub score: f32,
    pub usage_count: i64,
    pub matched_keywords: Vec<String>,
}

/// Top-K tools whose keyword set overlaps the request.
///
/// Ordering is (match count desc, score desc, usage desc), with tool name
/// as the final tie-break so output is stable across runs.
pub async fn suggest(
    pool: &PgPool,
    keywords: &[String],
    tool_type: Option<ToolType>,
    min_score: f32,
    limit: i64,
) -> Result<Vec<Suggestion>, StoreError> {
    let rows = sqlx::query_as::<_, Suggestion>(
        r#"SELECT tool_name,
                  max(tool_type) AS tool_type,
                  count(*) AS match_count,
                  avg(score)::real AS score,
                  sum(usage_count)::bigint AS usage_count,
                  array_agg(keyword ORDER BY keyword) AS matched_keywords
           FROM keyword_tool_scores
           WHERE keyword = ANY($1)
             AND ($2::text IS NULL OR tool_type = $2)
           GROUP BY tool_name
           HAVING avg(score) >= $3
           ORDER BY match_count DESC, score DESC, usage_count DESC, tool_name ASC
           LIMIT $4"#,
    )
    .bind(keywords)
    .bind(tool_type)
    .bind(min_score)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RoutingStats {
    pub keyword_count: i64,
    pub tool_count: i64,
    pub pair_count: i64,
    pub avg_score: Option<f32>,
    pub total_usage: i64,
    pub last_used: Option<DateTime<Utc>>,
}

pub async fn stats(pool: &PgPool) -> Result<RoutingStats, StoreError> {
    let stats = sqlx::query_as::<_, RoutingStats>(
        r#"SELECT count(DISTINCT keyword) AS keyword_count,
                  count(DISTINCT tool_name) AS tool_count,
                  count(*) AS pair_count,
                  avg(score)::real AS avg_score,
                  COALESCE(sum(usage_count), 0)::bigint AS total_usage,
                  max(last_used) AS last_used
           FROM keyword_tool_scores"#,
    )
    .fetch_one(pool)
    .await?;
    Ok(stats)
}
