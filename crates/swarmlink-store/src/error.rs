// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Storage error taxonomy.
//!
//! Query functions translate raw database errors into the variants the API
//! layer maps onto HTTP statuses: `NotFound` → 404, `Conflict` → 409,
//! `InvalidReference` → 400, everything else → 500.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn not_found(entity: &'static str) -> Self {
        StoreError::NotFound { entity }
    }

    /// Map a fetch error so a missing row names the entity instead of
    /// surfacing a bare `RowNotFound`.
    pub fn on_missing(entity: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
        move |e| match e {
            sqlx::Error::RowNotFound => StoreError::NotFound { entity },
            other => StoreError::Sqlx(other),
        }
    }

    /// Whether the underlying database error is a unique-constraint hit.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Sqlx(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Whether the underlying database error is a foreign-key violation.
    pub fn is_fk_violation(&self) -> bool {
        match self {
            StoreError::Sqlx(sqlx::Error::Database(db)) => db.is_foreign_key_violation(),
            _ => false,
        }
    }
}
