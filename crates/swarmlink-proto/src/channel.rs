// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Routing lanes for the event bridge.
//!
//! Five channel families identify where an event should be fanned out:
//!
//! | Channel | Receivers |
//! |---|---|
//! | `global` | every authenticated client |
//! | `agents/{agent_id}` | clients subscribed to that agent (plus `global`) |
//! | `sessions/{session_id}` | clients following one session |
//! | `topics/{topic_name}` | clients following one message topic |
//! | `metrics` | dashboard clients receiving `metric.update` |
//!
//! Channels serialize as their path form (`agents/orc-1`), so they can be
//! used directly in JSON frames and notification payloads.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A logical routing lane in the event bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Global,
    Agents(String),
    Sessions(String),
    Topics(String),
    Metrics,
}

impl Channel {
    pub fn agent(id: impl Into<String>) -> Self {
        Channel::Agents(id.into())
    }

    pub fn session(id: impl Into<String>) -> Self {
        Channel::Sessions(id.into())
    }

    pub fn topic(name: impl Into<String>) -> Self {
        Channel::Topics(name.into())
    }

    /// Whether a subscriber of `self` should receive an event published on
    /// `published`. `global` subscribers receive everything except metrics;
    /// `metrics` is its own lane.
    pub fn matches(&self, published: &Channel) -> bool {
        if self == published {
            return true;
        }
        matches!(self, Channel::Global) && !matches!(published, Channel::Metrics)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Global => write!(f, "global"),
            Channel::Agents(id) => write!(f, "agents/{id}"),
            Channel::Sessions(id) => write!(f, "sessions/{id}"),
            Channel::Topics(name) => write!(f, "topics/{name}"),
            Channel::Metrics => write!(f, "metrics"),
        }
    }
}

/// Error for unrecognized channel names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel: {0:?}")]
pub struct ParseChannelError(pub String);

impl FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => return Ok(Channel::Global),
            "metrics" => return Ok(Channel::Metrics),
            _ => {}
        }
        if let Some((family, rest)) = s.split_once('/') {
            if !rest.is_empty() {
                match family {
                    "agents" => return Ok(Channel::Agents(rest.to_string())),
                    "sessions" => return Ok(Channel::Sessions(rest.to_string())),
                    "topics" => return Ok(Channel::Topics(rest.to_string())),
                    _ => {}
                }
            }
        }
        Err(ParseChannelError(s.to_string()))
    }
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_family() {
        for raw in [
            "global",
            "metrics",
            "agents/orc-1",
            "sessions/S1",
            "topics/task.created",
        ] {
            let c: Channel = raw.parse().unwrap();
            assert_eq!(c.to_string(), raw);
        }
    }

    #[test]
    fn rejects_unknown_and_empty_suffixes() {
        assert!("".parse::<Channel>().is_err());
        assert!("agents/".parse::<Channel>().is_err());
        assert!("rooms/x".parse::<Channel>().is_err());
        assert!("globalx".parse::<Channel>().is_err());
    }

    #[test]
    fn global_subscriber_receives_agent_events() {
        let global = Channel::Global;
        assert!(global.matches(&Channel::agent("x")));
        assert!(global.matches(&Channel::session("S1")));
        assert!(global.matches(&Channel::Global));
    }

    #[test]
    fn global_subscriber_does_not_receive_metrics() {
        assert!(!Channel::Global.matches(&Channel::Metrics));
        assert!(Channel::Metrics.matches(&Channel::Metrics));
    }

    #[test]
    fn agent_lane_is_exact_match() {
        assert!(Channel::agent("x").matches(&Channel::agent("x")));
        assert!(!Channel::agent("x").matches(&Channel::agent("y")));
        assert!(!Channel::agent("x").matches(&Channel::Global));
    }

    #[test]
    fn serializes_as_path_string() {
        let json = serde_json::to_string(&Channel::agent("orc")).unwrap();
        assert_eq!(json, "\"agents/orc\"");
        let back: Channel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Channel::agent("orc"));
    }
}
