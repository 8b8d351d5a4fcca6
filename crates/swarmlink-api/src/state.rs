// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Shared application state. Clone-friendly — the pool and every Arc are
//! cheap to clone into each handler.
//!
//! There are deliberately no caches of domain data here: briefs, snapshots
//! and suggestions are always read fresh from the database so concurrent
//! API workers cannot diverge.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use sqlx::PgPool;
use tokio::sync::RwLock;

use swarmlink_config::Config;
use swarmlink_store::queries::messages::SweepResult;

/// Token mint budget: 10 requests per 15-minute window per identity.
const MINT_PER_WINDOW: u32 = 10;
const MINT_WINDOW_SECS: u64 = 15 * 60;

type MintLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// Rolling statistics from the message expiry sweeper.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct CleanupStats {
    pub runs: u64,
    pub expired_deleted: u64,
    pub read_deleted: u64,
    pub ran_at: Option<DateTime<Utc>>,
}

impl CleanupStats {
    pub fn record(&mut self, sweep: SweepResult, at: DateTime<Utc>) {
        self.runs += 1;
        self.expired_deleted += sweep.expired_deleted;
        self.read_deleted += sweep.read_deleted;
        self.ran_at = Some(at);
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub cleanup: Arc<RwLock<CleanupStats>>,
    mint_limiter: Arc<MintLimiter>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        // 10 per 15 min as GCRA: one cell every 90 s, burst of 10.
        let quota = Quota::with_period(Duration::from_secs(MINT_WINDOW_SECS / MINT_PER_WINDOW as u64))
            .unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(MINT_PER_WINDOW).unwrap_or(NonZeroU32::MIN));

        Self {
            pool,
            config,
            cleanup: Arc::new(RwLock::new(CleanupStats::default())),
            mint_limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Whether `identity` may mint another token right now. The identity
    /// is the requesting agent id, or the peer IP when no agent id was
    /// supplied (see `routes::auth`).
    pub fn allow_mint(&self, identity: &str) -> bool {
        self.mint_limiter.check_key(&identity.to_string()).is_ok()
    }
}
