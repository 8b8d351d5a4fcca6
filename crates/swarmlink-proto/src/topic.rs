// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The closed set of agent message topics.
//!
//! Publishers must use one of these; an unknown topic is a validation error
//! at the REST boundary, never a silent pass-through.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Topic of an inter-agent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTopic {
    TaskCreated,
    TaskCompleted,
    TaskFailed,
    ContextRequest,
    ContextResponse,
    AlertBlocking,
    AgentHeartbeat,
    WorkflowProgress,
    AgentCompleted,
}

impl MessageTopic {
    pub const ALL: [MessageTopic; 9] = [
        MessageTopic::TaskCreated,
        MessageTopic::TaskCompleted,
        MessageTopic::TaskFailed,
        MessageTopic::ContextRequest,
        MessageTopic::ContextResponse,
        MessageTopic::AlertBlocking,
        MessageTopic::AgentHeartbeat,
        MessageTopic::WorkflowProgress,
        MessageTopic::AgentCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageTopic::TaskCreated => "task.created",
            MessageTopic::TaskCompleted => "task.completed",
            MessageTopic::TaskFailed => "task.failed",
            MessageTopic::ContextRequest => "context.request",
            MessageTopic::ContextResponse => "context.response",
            MessageTopic::AlertBlocking => "alert.blocking",
            MessageTopic::AgentHeartbeat => "agent.heartbeat",
            MessageTopic::WorkflowProgress => "workflow.progress",
            MessageTopic::AgentCompleted => "agent.completed",
        }
    }
}

impl fmt::Display for MessageTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for topics outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message topic: {0:?}")]
pub struct ParseTopicError(pub String);

impl FromStr for MessageTopic {
    type Err = ParseTopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageTopic::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| ParseTopicError(s.to_string()))
    }
}

impl Serialize for MessageTopic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageTopic {
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
    fn every_topic_round_trips() {
        for t in MessageTopic::ALL {
            let s = t.as_str();
            assert_eq!(s.parse::<MessageTopic>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_topic_is_rejected() {
        assert!("task.exploded".parse::<MessageTopic>().is_err());
        assert!("".parse::<MessageTopic>().is_err());
    }

    #[test]
    fn serde_uses_dotted_names() {
        let json = serde_json::to_string(&MessageTopic::AlertBlocking).unwrap();
        assert_eq!(json, "\"alert.blocking\"");
    }
}
