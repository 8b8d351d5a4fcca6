// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The notification envelope carried on the database pub/sub channel.
//!
//! Every state-changing REST handler emits exactly one of these via
//! `pg_notify` inside its transaction. Postgres delivers NOTIFY payloads
//! only after commit, so LISTEN receivers never observe events for
//! rolled-back transactions.
//!
//! The payload must stay well under the Postgres NOTIFY limit (8000 bytes),
//! so `data` carries identifiers and summaries, never blobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::Channel;

/// Name of the single Postgres NOTIFY channel both processes agree on.
pub const NOTIFY_CHANNEL: &str = "swarmlink_events";

/// One committed state change, ready for fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub channel: Channel,
    pub event: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(channel: Channel, event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            channel,
            event: event.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// Critical events are tracked for at-least-once delivery by the bridge;
    /// everything else is fire-and-forget.
    pub fn is_critical(&self) -> bool {
        self.event.starts_with("task.")
            || self.event.starts_with("subtask.")
            || self.event.starts_with("message.")
    }

    pub fn encode(&self) -> String {
        // Serialization of a Value/String/DateTime envelope cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_decode_round_trip() {
        let n = Notification::new(
            Channel::agent("dev-1"),
            "subtask.running",
            json!({"subtask_id": "abc"}),
        );
        let back = Notification::decode(&n.encode()).unwrap();
        assert_eq!(back.channel, Channel::agent("dev-1"));
        assert_eq!(back.event, "subtask.running");
        assert_eq!(back.data["subtask_id"], "abc");
    }

    #[test]
    fn criticality_follows_event_prefix() {
        let mk = |event: &str| Notification::new(Channel::Global, event, json!({}));
        assert!(mk("task.created").is_critical());
        assert!(mk("subtask.completed").is_critical());
        assert!(mk("message.created").is_critical());
        assert!(!mk("action.created").is_critical());
        assert!(!mk("metric.update").is_critical());
        assert!(!mk("agent.connected").is_critical());
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        assert!(Notification::decode("not json").is_err());
        assert!(Notification::decode("{\"channel\":\"nope\"}").is_err());
    }
}
