// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The JSON frame protocol spoken over bridge WebSocket connections.
//!
//! # Typical connection flow
//!
//! ```text
//! Client                              Bridge
//!   │── auth {token} ──────────────────►│  verify, auto-subscribe
//!   │◄─ connected {client_id} ──────────│
//!   │── subscribe {channel} ───────────►│
//!   │◄─ ack {id, success} ──────────────│
//!   │◄─ event {id, channel, event, …} ──│  (repeated)
//!   │── ack {message_id} ──────────────►│  (for critical events)
//!   │◄─ ping ───────────────────────────│  every 30 s
//!   │── ping ──────────────────────────►│  (client may also ping)
//!   │◄─ pong ───────────────────────────│
//! ```
//!
//! Client frames carry an optional monotonic client clock `ts`; all server
//! frames carry the server timestamp. Event ids are stable — a client that
//! receives a duplicate (at-least-once redelivery) must dedupe on `id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Client → server ───────────────────────────────────────────────────────────

/// Frames a client may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Authenticate the connection. Either a signed `token`, or in dev mode
    /// a bare `agent_id`.
    Auth {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<i64>,
    },

    /// Join a channel.
    Subscribe {
        channel: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<i64>,
    },

    /// Leave a channel.
    Unsubscribe {
        channel: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<i64>,
    },

    /// Publish an application event to a channel through the bridge.
    Publish {
        channel: String,
        event: String,
        #[serde(default)]
        data: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<i64>,
    },

    /// Liveness probe; also counts as activity for heartbeat eviction.
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<i64>,
    },

    /// Acknowledge receipt of a critical event.
    Ack {
        message_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<i64>,
    },
}

// ── Server → client ───────────────────────────────────────────────────────────

/// Frames the bridge sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once after successful authentication.
    Connected {
        client_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Result of a `subscribe`/`unsubscribe`/`publish` request.
    Ack {
        id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },

    Pong {
        timestamp: DateTime<Utc>,
    },

    /// Protocol or auth error. `code` is machine-readable.
    Error {
        code: String,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
        timestamp: DateTime<Utc>,
    },

    /// A fanned-out event. `id` is stable across redeliveries.
    Event {
        id: Uuid,
        channel: String,
        event: String,
        data: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// Server-initiated liveness probe.
    Ping {
        timestamp: DateTime<Utc>,
    },
}

impl ServerFrame {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code: code.to_string(),
            error: message.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn ack_ok(id: impl Into<String>) -> Self {
        ServerFrame::Ack {
            id: id.into(),
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn ack_err(id: impl Into<String>, error: impl Into<String>) -> Self {
        ServerFrame::Ack {
            id: id.into(),
            success: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_frames_are_tagged_snake_case() {
        let f: ClientFrame =
            serde_json::from_str(r#"{"type":"subscribe","channel":"global","ts":7}"#).unwrap();
        assert!(matches!(f, ClientFrame::Subscribe { ref channel, ts: Some(7) } if channel == "global"));
    }

    #[test]
    fn auth_frame_accepts_bare_agent_id() {
        let f: ClientFrame = serde_json::from_str(r#"{"type":"auth","agent_id":"dev-1"}"#).unwrap();
        match f {
            ClientFrame::Auth {
                token, agent_id, ..
            } => {
                assert!(token.is_none());
                assert_eq!(agent_id.as_deref(), Some("dev-1"));
            }
            other => panic!("expected auth frame, got {other:?}"),
        }
    }

    #[test]
    fn publish_defaults_data_to_null() {
        let f: ClientFrame =
            serde_json::from_str(r#"{"type":"publish","channel":"global","event":"x"}"#).unwrap();
        match f {
            ClientFrame::Publish { data, .. } => assert!(data.is_null()),
            other => panic!("expected publish frame, got {other:?}"),
        }
    }

    #[test]
    fn unknown_frame_type_is_an_error() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"shutdown"}"#).is_err());
    }

    #[test]
    fn event_frame_wire_shape() {
        let ev = ServerFrame::Event {
            id: Uuid::nil(),
            channel: "global".into(),
            event: "subtask.completed".into(),
            data: json!({"subtask_id": "s"}),
            timestamp: Utc::now(),
        };
        let v: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "event");
        assert_eq!(v["channel"], "global");
        assert_eq!(v["event"], "subtask.completed");
        assert!(v["timestamp"].is_string());
    }

    #[test]
    fn ack_helpers_set_success_flag() {
        let ok = ServerFrame::ack_ok("sub:global");
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["success"], true);
        assert!(v.get("error").is_none(), "ok ack must omit error");

        let err = ServerFrame::ack_err("sub:x", "unknown channel");
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["error"], "unknown channel");
    }
}
