// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Postgres storage layer.
//!
//! Owns the schema (embedded sqlx migrations), the typed row models, and
//! every query the API and bridge run. Handlers never build SQL themselves;
//! they call functions from [`queries`].
//!
//! # Conventions
//!
//! - Enum-valued columns are TEXT; the Rust enums in [`models`] map through
//!   a shared text-enum implementation, so an unknown value in the database
//!   is a decode error, never a silent default.
//! - Multi-statement write paths (action ingest, subtask transitions) run in
//!   one transaction and emit their notification via [`notify::emit`] before
//!   commit — Postgres delivers NOTIFY only after the transaction commits,
//!   so listeners never observe rolled-back events.
//! - No query result is cached in process memory.

pub mod compress;
pub mod error;
pub mod keywords;
pub mod models;
pub mod notify;
pub mod queries;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::warn;

pub use error::StoreError;
pub use sqlx::PgPool;

/// Embedded schema migrations; `_sqlx_migrations` is the version registry.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Open a connection pool. `max_connections` bounds handler concurrency in
/// the API process (default 10 from config). Connecting is idempotent, so
/// transient failures are retried up to `max_retries` times with a short
/// backoff before giving up.
pub async fn connect(
    url: &str,
    max_connections: u32,
    max_retries: u32,
) -> Result<PgPool, StoreError> {
    let options = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5));

    let mut attempt = 0;
    loop {
        match options.clone().connect(url).await {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                warn!("database connect failed (attempt {attempt}/{max_retries}): {e}");
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Run pending migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    MIGRATOR.run(pool).await?;
    Ok(())
}
