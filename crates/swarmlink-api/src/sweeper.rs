// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The message expiry sweeper.
//!
//! Runs every 60 seconds, deletes expired rows (plus delivered targeted
//! messages past their usefulness), and records rolling statistics served
//! by `GET /api/cleanup/stats`. An overrun or a failed sweep never
//! prevents the next tick.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use swarmlink_store::queries::messages;

use crate::state::AppState;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the sweeper until the process exits. Spawned once at API startup.
pub async fn run(state: AppState) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match messages::sweep(&state.pool).await {
            Ok(result) => {
                if result.expired_deleted > 0 || result.read_deleted > 0 {
                    debug!(
                        expired = result.expired_deleted,
                        read = result.read_deleted,
                        "message sweep"
                    );
                }
                state.cleanup.write().await.record(result, Utc::now());
            }
            Err(e) => warn!("message sweep failed: {e}"),
        }
    }
}
