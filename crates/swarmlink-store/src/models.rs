// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Typed rows for every table, plus the closed status/type vocabularies.
//!
//! Enum-valued columns are stored as TEXT. Each enum maps through
//! [`text_enum!`], which wires up `Display`/`FromStr`, serde, and the sqlx
//! `Type`/`Encode`/`Decode` triple over the text representation — the same
//! lowercase word on the wire, in JSON, and in the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved `agent_type` marking a compact snapshot row in `agent_contexts`.
pub const COMPACT_SNAPSHOT_TYPE: &str = "compact-snapshot";

/// The `agent_id` under which a session's compact snapshot is stored.
pub fn compact_snapshot_agent_id(session_id: &str) -> String {
    format!("{COMPACT_SNAPSHOT_TYPE}:{session_id}")
}

/// A text value that is not part of a closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident as $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let s = String::deserialize(d)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <&str as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
                Ok(s.parse::<$name>()?)
            }
        }
    };
}

text_enum! {
    /// Category of the user prompt that opened a request.
    PromptType as "prompt_type" {
        Feature => "feature",
        Debug => "debug",
        Explain => "explain",
        Search => "search",
        Refactor => "refactor",
        Test => "test",
        Review => "review",
        Other => "other",
    }
}

text_enum! {
    /// Lifecycle of a request.
    RequestStatus as "request status" {
        Active => "active",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled
        )
    }
}

text_enum! {
    /// Lifecycle of a task (wave).
    TaskStatus as "task status" {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Blocked => "blocked",
    }
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

text_enum! {
    /// Lifecycle of a subtask (one unit of agent work).
    SubtaskStatus as "subtask status" {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Blocked => "blocked",
        Completed => "completed",
        Failed => "failed",
    }
}

impl SubtaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubtaskStatus::Completed | SubtaskStatus::Failed)
    }

    /// Statuses that count as "this agent is currently working".
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SubtaskStatus::Running | SubtaskStatus::Paused | SubtaskStatus::Blocked
        )
    }
}

text_enum! {
    /// Origin class of a tool invocation.
    ToolType as "tool_type" {
        Builtin => "builtin",
        Agent => "agent",
        Skill => "skill",
        Command => "command",
        Mcp => "mcp",
    }
}

// ── Rows ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub path: String,
    pub name: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub project_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_tools_used: i32,
    pub total_success: i32,
    pub total_errors: i32,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Request {
    pub id: Uuid,
    pub project_id: Uuid,
    pub session_id: String,
    pub prompt: String,
    pub prompt_type: PromptType,
    pub status: RequestStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub request_id: Uuid,
    pub name: String,
    pub wave_number: i32,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: Uuid,
    pub agent_type: Option<String>,
    pub agent_id: Option<String>,
    pub description: String,
    pub status: SubtaskStatus,
    pub blocked_by: Vec<Uuid>,
    pub context_snapshot: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A tool invocation, with input/output already decompressed.
#[derive(Debug, Clone, Serialize)]
pub struct Action {
    pub id: Uuid,
    pub subtask_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub tool_name: String,
    pub tool_type: ToolType,
    pub input: Option<String>,
    pub output: Option<String>,
    pub file_paths: Vec<String>,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<i32>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AgentMessage {
    pub id: Uuid,
    pub from_agent: String,
    pub to_agent: Option<String>,
    pub topic: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub read_by: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub agent_id: String,
    pub topic: String,
    pub callback_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Blocking {
    pub id: Uuid,
    pub blocker: String,
    pub blocked: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AgentContext {
    pub id: Uuid,
    pub project_id: Uuid,
    pub agent_id: String,
    pub agent_type: String,
    pub role_context: serde_json::Value,
    pub skills_to_restore: Vec<String>,
    pub tools_used: Vec<String>,
    pub progress_summary: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl AgentContext {
    pub fn is_compact_snapshot(&self) -> bool {
        self.agent_type == COMPACT_SNAPSHOT_TYPE
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct KeywordToolScore {
    pub id: Uuid,
    pub keyword: String,
    pub tool_name: String,
    pub tool_type: ToolType,
    pub score: f32,
    pub usage_count: i32,
    pub success_count: i32,
    pub last_used: DateTime<Utc>,
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_enum_round_trips_through_text() {
        for v in PromptType::ALL {
            assert_eq!(v.as_str().parse::<PromptType>().unwrap(), *v);
        }
        for v in RequestStatus::ALL {
            assert_eq!(v.as_str().parse::<RequestStatus>().unwrap(), *v);
        }
        for v in TaskStatus::ALL {
            assert_eq!(v.as_str().parse::<TaskStatus>().unwrap(), *v);
        }
        for v in SubtaskStatus::ALL {
            assert_eq!(v.as_str().parse::<SubtaskStatus>().unwrap(), *v);
        }
        for v in ToolType::ALL {
            assert_eq!(v.as_str().parse::<ToolType>().unwrap(), *v);
        }
    }

    #[test]
    fn unknown_text_names_the_vocabulary() {
        let err = "sideways".parse::<SubtaskStatus>().unwrap_err();
        assert_eq!(err.kind, "subtask status");
        assert_eq!(err.value, "sideways");
    }

    #[test]
    fn serde_uses_lowercase_words() {
        assert_eq!(serde_json::to_string(&ToolType::Mcp).unwrap(), "\"mcp\"");
        let back: SubtaskStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(back, SubtaskStatus::Paused);
    }

    #[test]
    fn terminal_and_active_sets_are_disjoint() {
        for s in SubtaskStatus::ALL {
            assert!(
                !(s.is_terminal() && s.is_active()),
                "{s} cannot be both terminal and active"
            );
        }
    }

    #[test]
    fn compact_snapshot_agent_id_is_prefixed() {
        assert_eq!(
            compact_snapshot_agent_id("S42"),
            "compact-snapshot:S42"
        );
    }
}
