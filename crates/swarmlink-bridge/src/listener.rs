// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The long-lived database subscription.
//!
//! Holds LISTEN on the shared channel and feeds every committed payload to
//! the registry fan-out. Postgres only delivers NOTIFY after commit, so
//! nothing observed here can belong to a rolled-back transaction.
//!
//! A dropped subscription reconnects with exponential backoff (250 ms
//! doubling to a 5 s cap); heartbeats and metrics run independently and
//! keep going while this loop recovers. A malformed payload is logged and
//! skipped, never fatal.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use swarmlink_proto::{Notification, NOTIFY_CHANNEL};

use crate::BridgeContext;

const BACKOFF_INITIAL: Duration = Duration::from_millis(250);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

pub async fn run(pool: PgPool, ctx: Arc<BridgeContext>) {
    let mut backoff = BACKOFF_INITIAL;

    loop {
        let mut listener = match connect(&pool).await {
            Ok(listener) => {
                backoff = BACKOFF_INITIAL;
                listener
            }
            Err(e) => {
                error!("LISTEN setup failed, retrying in {backoff:?}: {e}");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(BACKOFF_CAP);
                continue;
            }
        };

        info!(channel = NOTIFY_CHANNEL, "database subscription established");

        loop {
            match listener.recv().await {
                Ok(raw) => match Notification::decode(raw.payload()) {
                    Ok(notification) => {
                        debug!(
                            event = %notification.event,
                            channel = %notification.channel,
                            "notification received"
                        );
                        ctx.registry.fan_out(&notification);
                    }
                    Err(e) => {
                        warn!("skipping malformed notification payload: {e}");
                    }
                },
                Err(e) => {
                    error!("database subscription dropped: {e}");
                    break;
                }
            }
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(BACKOFF_CAP);
    }
}

async fn connect(pool: &PgPool) -> Result<PgListener, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(NOTIFY_CHANNEL).await?;
    Ok(listener)
}
