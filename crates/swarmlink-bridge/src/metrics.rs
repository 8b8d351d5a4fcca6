// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The metrics aggregator: every 5 seconds, run the fixed query set and
//! broadcast one `metric.update` on the `metrics` channel. Metrics events
//! are never retried, and an overrun (the per-run deadline) never blocks
//! the next tick.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::warn;

use swarmlink_proto::{Channel, Notification};
use swarmlink_store::queries::stats;

use crate::BridgeContext;

pub const AGGREGATE_INTERVAL: Duration = Duration::from_secs(5);

/// Per-run deadline; a slow database skips the tick instead of stacking.
const RUN_DEADLINE: Duration = Duration::from_secs(4);

pub async fn run(pool: PgPool, ctx: Arc<BridgeContext>) {
    let mut interval = tokio::time::interval(AGGREGATE_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let snapshot = tokio::time::timeout(RUN_DEADLINE, stats::metrics_snapshot(&pool)).await;
        match snapshot {
            Ok(Ok(snapshot)) => {
                let data = serde_json::to_value(&snapshot).unwrap_or_default();
                ctx.registry
                    .fan_out(&Notification::new(Channel::Metrics, "metric.update", data));
            }
            Ok(Err(e)) => warn!("metrics aggregation failed: {e}"),
            Err(_) => warn!("metrics aggregation overran its deadline, skipping tick"),
        }
    }
}
