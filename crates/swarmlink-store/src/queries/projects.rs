// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Projects: the root of the work hierarchy, idempotent on `path`.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::Project;

/// Canonical form of a project path: trailing separators trimmed, but a
/// bare root `/` is preserved.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Idempotent create: conflict on `path` updates name/metadata in place.
/// The metadata map is shallow-merged (`||`), and the row trigger advances
/// `updated_at`.
pub async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    path: &str,
    name: Option<&str>,
    metadata: &serde_json::Value,
) -> Result<Project, StoreError> {
    let project = sqlx::query_as::<_, Project>(
        r#"INSERT INTO projects (path, name, metadata)
           VALUES ($1, $2, $3)
           ON CONFLICT (path) DO UPDATE SET
               name = COALESCE(EXCLUDED.name, projects.name),
               metadata = projects.metadata || EXCLUDED.metadata
           RETURNING *"#,
    )
    .bind(normalize_path(path))
    .bind(name)
    .bind(metadata)
    .fetch_one(executor)
    .await?;
    Ok(project)
}

pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Project>, StoreError> {
    let rows = sqlx::query_as::<_, Project>(
        "SELECT * FROM projects ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Project, StoreError> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(StoreError::on_missing("project"))
}

pub async fn by_path(pool: &PgPool, path: &str) -> Result<Project, StoreError> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE path = $1")
        .bind(normalize_path(path))
        .fetch_one(pool)
        .await
        .map_err(StoreError::on_missing("project"))
}

/// Delete a project; foreign keys cascade through the whole hierarchy.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("project"));
    }
    Ok(())
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_trailing_separators() {
        assert_eq!(normalize_path("/work/repo/"), "/work/repo");
        assert_eq!(normalize_path("/work/repo///"), "/work/repo");
        assert_eq!(normalize_path("/work/repo"), "/work/repo");
    }

    #[test]
    fn normalize_preserves_root() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("///"), "/");
    }
}
