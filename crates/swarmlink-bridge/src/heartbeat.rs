// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Heartbeats: `ping` every 30 seconds to every client; anyone silent for
//! more than 60 seconds is closed and removed from every subscription
//! index. Any inbound frame counts as activity.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use swarmlink_proto::ServerFrame;

use crate::BridgeContext;

pub const PING_INTERVAL: Duration = Duration::from_secs(30);
pub const IDLE_AFTER_SECS: u64 = 60;

pub async fn run(ctx: Arc<BridgeContext>) {
    let mut interval = tokio::time::interval(PING_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let idle = ctx.registry.idle_clients(IDLE_AFTER_SECS);
        for client_id in idle {
            info!(%client_id, "evicting silent client");
            ctx.registry.remove(client_id);
        }

        ctx.registry.broadcast_frame(&ServerFrame::Ping {
            timestamp: Utc::now(),
        });
    }
}
