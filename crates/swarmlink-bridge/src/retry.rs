// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The at-least-once retry sweeper.
//!
//! Every 2 seconds, entries older than 5 seconds are retransmitted; after
//! 3 attempts without an ack the entry is dropped and logged. Clients see
//! duplicates, never silent loss — they dedupe on the stable event id.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::BridgeContext;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(2);

pub async fn run(ctx: Arc<BridgeContext>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let (resent, dropped) = ctx.registry.sweep_pending();
        if resent > 0 || dropped > 0 {
            debug!(resent, dropped, "retry sweep");
        }
    }
}
