// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Wire types shared by the API and bridge processes.
//!
//! Everything that crosses a process boundary lives here: the channel
//! naming scheme, the database notification envelope, the WebSocket frame
//! protocol, the message topic set, and the signed auth token format.
//!
//! All JSON framing uses `#[serde(tag = "type", rename_all = "snake_case")]`
//! tagged enums so frames are self-describing on the wire.

pub mod channel;
pub mod frame;
pub mod notify;
pub mod token;
pub mod topic;

pub use channel::Channel;
pub use frame::{ClientFrame, ServerFrame};
pub use notify::{Notification, NOTIFY_CHANNEL};
pub use token::{sign_token, verify_token, TokenClaims, TokenError, TOKEN_TTL_SECS};
pub use topic::MessageTopic;
