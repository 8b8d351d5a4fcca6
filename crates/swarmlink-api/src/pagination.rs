// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! List pagination: `limit` defaults to 100 and caps at 100 everywhere
//! except the actions listing (cap 5000). Responses echo
//! `{count, limit, offset}` around the items.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 100;
pub const MAX_ACTION_LIMIT: i64 = 5000;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.clamped(MAX_LIMIT)
    }

    /// The one exception: action listings admit much larger pages for
    /// bulk export.
    pub fn action_limit(&self) -> i64 {
        self.clamped(MAX_ACTION_LIMIT)
    }

    fn clamped(&self, cap: i64) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, cap)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// The list envelope every collection endpoint returns.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub limit: i64,
    pub offset: i64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, limit: i64, offset: i64) -> Self {
        Self {
            count: items.len(),
            limit,
            offset,
            items,
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limit_is_one_hundred() {
        let p = Pagination::default();
        assert_eq!(p.limit(), 100);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn limit_caps_at_one_hundred() {
        let p = Pagination {
            limit: Some(5000),
            offset: None,
        };
        assert_eq!(p.limit(), 100);
    }

    #[test]
    fn action_limit_caps_at_five_thousand() {
        let p = Pagination {
            limit: Some(100_000),
            offset: None,
        };
        assert_eq!(p.action_limit(), 5000);
        let p = Pagination {
            limit: Some(250),
            offset: None,
        };
        assert_eq!(p.action_limit(), 250);
    }

    #[test]
    fn nonsense_values_are_clamped() {
        let p = Pagination {
            limit: Some(0),
            offset: Some(-5),
        };
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 0);
    }
}
