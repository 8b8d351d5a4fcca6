// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Commit-coupled notification emission.
//!
//! Writers call [`emit`] *inside* their transaction. Postgres queues the
//! NOTIFY and delivers it to LISTEN holders only when the transaction
//! commits, which is exactly the ordering guarantee the bridge depends on:
//! no client ever sees an event for a rolled-back write.

use swarmlink_proto::{Notification, NOTIFY_CHANNEL};
use tracing::warn;

/// Emit one notification on the shared channel.
///
/// Payloads must stay under the Postgres NOTIFY limit; oversized payloads
/// are truncated to an id-only envelope rather than failing the caller's
/// transaction.
pub async fn emit(
    executor: impl sqlx::PgExecutor<'_>,
    notification: &Notification,
) -> Result<(), sqlx::Error> {
    let mut payload = notification.encode();
    if payload.len() > 7500 {
        warn!(
            event = %notification.event,
            bytes = payload.len(),
            "notification payload too large, stripping data"
        );
        let stripped = Notification {
            channel: notification.channel.clone(),
            event: notification.event.clone(),
            data: serde_json::json!({"truncated": true}),
            timestamp: notification.timestamp,
        };
        payload = stripped.encode();
    }

    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(NOTIFY_CHANNEL)
        .bind(payload)
        .execute(executor)
        .await?;
    Ok(())
}
