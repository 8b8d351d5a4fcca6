// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! One module per resource family. Functions take `&PgPool` for single
//! statements and `&mut PgTransaction` (`*_in_tx`) where the API composes a
//! larger atomic group around them.

pub mod actions;
pub mod blocking;
pub mod contexts;
pub mod messages;
pub mod projects;
pub mod requests;
pub mod routing;
pub mod sessions;
pub mod stats;
pub mod subscriptions;
pub mod subtasks;
pub mod tasks;
