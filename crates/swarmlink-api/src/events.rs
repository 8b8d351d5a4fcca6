// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Maps committed writes onto bridge notifications.
//!
//! Each state-changing handler asks this module which notifications to
//! emit; the handler runs them through `store::notify::emit` inside its
//! transaction (or right after a single-statement write, where autocommit
//! gives the same ordering).
//!
//! The subtask mapping follows the lifecycle contract:
//! - `running`   → `subtask.running` on `global` and `agents/{agent_type}`,
//!                  plus `agent.connected` on `global`
//! - terminal    → `subtask.completed|failed` on both, plus
//!                  `agent.disconnected` on `global`, plus a broadcast
//!                  `agent.completed` message inserted in the same
//!                  transaction (unconditionally, even without an
//!                  `agent_type` — the sender falls back to the subtask id)

use serde_json::json;

use swarmlink_proto::{Channel, Notification};
use swarmlink_store::models::{AgentMessage, Subtask, SubtaskStatus, Task};
use swarmlink_store::queries::subtasks::SubtaskTransition;

pub fn subtask_created(subtask: &Subtask) -> Vec<Notification> {
    vec![Notification::new(
        Channel::Global,
        "subtask.created",
        subtask_data(subtask),
    )]
}

/// Notifications for a subtask status change.
pub fn subtask_transition(subtask: &Subtask, transition: &SubtaskTransition) -> Vec<Notification> {
    let mut out = Vec::new();
    let data = subtask_data(subtask);

    if transition.became_running {
        out.push(Notification::new(
            Channel::Global,
            "subtask.running",
            data.clone(),
        ));
        if let Some(agent_type) = &subtask.agent_type {
            out.push(Notification::new(
                Channel::agent(agent_type.clone()),
                "subtask.running",
                data.clone(),
            ));
        }
        out.push(Notification::new(
            Channel::Global,
            "agent.connected",
            json!({
                "agent_id": subtask.agent_id,
                "agent_type": subtask.agent_type,
                "subtask_id": subtask.id,
            }),
        ));
    }

    if transition.became_terminal {
        let event = match subtask.status {
            SubtaskStatus::Failed => "subtask.failed",
            _ => "subtask.completed",
        };
        out.push(Notification::new(Channel::Global, event, data.clone()));
        if let Some(agent_type) = &subtask.agent_type {
            out.push(Notification::new(
                Channel::agent(agent_type.clone()),
                event,
                data.clone(),
            ));
        }
        out.push(Notification::new(
            Channel::Global,
            "agent.disconnected",
            json!({
                "agent_id": subtask.agent_id,
                "agent_type": subtask.agent_type,
                "subtask_id": subtask.id,
            }),
        ));
    }

    out
}

/// The broadcast message inserted when a subtask reaches a terminal state.
/// Returns (from_agent, payload).
pub fn subtask_completion_message(subtask: &Subtask) -> (String, serde_json::Value) {
    let from = subtask
        .agent_id
        .clone()
        .or_else(|| subtask.agent_type.clone())
        .unwrap_or_else(|| subtask.id.to_string());
    let payload = json!({
        "subtask_id": subtask.id,
        "task_id": subtask.task_id,
        "status": subtask.status,
        "agent_type": subtask.agent_type,
        "result": subtask.result,
    });
    (from, payload)
}

pub fn task_created(task: &Task) -> Vec<Notification> {
    vec![Notification::new(
        Channel::Global,
        "task.created",
        json!({
            "task_id": task.id,
            "request_id": task.request_id,
            "name": task.name,
            "wave_number": task.wave_number,
            "status": task.status,
        }),
    )]
}

pub fn task_updated(task: &Task) -> Vec<Notification> {
    vec![Notification::new(
        Channel::Global,
        "task.updated",
        json!({
            "task_id": task.id,
            "request_id": task.request_id,
            "status": task.status,
        }),
    )]
}

/// `message.created` goes out on the topic lane, plus the addressee's agent
/// lane when targeted. Global subscribers see both through channel matching.
pub fn message_published(message: &AgentMessage) -> Vec<Notification> {
    let data = json!({
        "message_id": message.id,
        "from_agent": message.from_agent,
        "to_agent": message.to_agent,
        "topic": message.topic,
        "priority": message.priority,
    });
    let mut out = vec![Notification::new(
        Channel::topic(message.topic.clone()),
        "message.created",
        data.clone(),
    )];
    if let Some(to) = &message.to_agent {
        out.push(Notification::new(
            Channel::agent(to.clone()),
            "message.created",
            data,
        ));
    }
    out
}

pub fn session_event(session_id: &str, event: &str) -> Vec<Notification> {
    vec![Notification::new(
        Channel::session(session_id.to_string()),
        event,
        json!({ "session_id": session_id }),
    )]
}

pub fn agent_event(agent_id: &str, event: &str, data: serde_json::Value) -> Vec<Notification> {
    vec![Notification::new(
        Channel::agent(agent_id.to_string()),
        event,
        data,
    )]
}

pub fn global_event(event: &str, data: serde_json::Value) -> Vec<Notification> {
    vec![Notification::new(Channel::Global, event, data)]
}

fn subtask_data(subtask: &Subtask) -> serde_json::Value {
    json!({
        "subtask_id": subtask.id,
        "task_id": subtask.task_id,
        "status": subtask.status,
        "agent_type": subtask.agent_type,
        "agent_id": subtask.agent_id,
        "description": subtask.description,
    })
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn subtask(status: SubtaskStatus, agent_type: Option<&str>) -> Subtask {
        Subtask {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            agent_type: agent_type.map(String::from),
            agent_id: Some("dev-1".into()),
            description: "implement auth".into(),
            status,
            blocked_by: vec![],
            context_snapshot: None,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    fn transition(running: bool, terminal: bool) -> SubtaskTransition {
        SubtaskTransition {
            previous: SubtaskStatus::Pending,
            became_running: running,
            became_terminal: terminal,
        }
    }

    #[test]
    fn running_emits_on_both_lanes_plus_agent_connected() {
        let st = subtask(SubtaskStatus::Running, Some("backend"));
        let events = subtask_transition(&st, &transition(true, false));
        let names: Vec<_> = events.iter().map(|n| n.event.as_str()).collect();
        assert_eq!(names, ["subtask.running", "subtask.running", "agent.connected"]);
        assert_eq!(events[0].channel, Channel::Global);
        assert_eq!(events[1].channel, Channel::agent("backend"));
        assert_eq!(events[2].channel, Channel::Global);
    }

    #[test]
    fn terminal_failed_emits_failed_and_disconnected() {
        let st = subtask(SubtaskStatus::Failed, Some("backend"));
        let events = subtask_transition(&st, &transition(false, true));
        let names: Vec<_> = events.iter().map(|n| n.event.as_str()).collect();
        assert_eq!(names, ["subtask.failed", "subtask.failed", "agent.disconnected"]);
    }

    #[test]
    fn no_agent_type_skips_the_agent_lane_only() {
        let st = subtask(SubtaskStatus::Completed, None);
        let events = subtask_transition(&st, &transition(false, true));
        let names: Vec<_> = events.iter().map(|n| n.event.as_str()).collect();
        assert_eq!(names, ["subtask.completed", "agent.disconnected"]);
    }

    #[test]
    fn completion_message_falls_back_to_subtask_id() {
        let mut st = subtask(SubtaskStatus::Completed, None);
        st.agent_id = None;
        let (from, payload) = subtask_completion_message(&st);
        assert_eq!(from, st.id.to_string());
        assert_eq!(payload["subtask_id"], serde_json::json!(st.id));
    }

    #[test]
    fn targeted_message_adds_the_agent_lane() {
        let msg = AgentMessage {
            id: Uuid::new_v4(),
            from_agent: "orc".into(),
            to_agent: Some("dev-1".into()),
            topic: "task.created".into(),
            payload: serde_json::json!({}),
            priority: 5,
            read_by: vec![],
            created_at: Utc::now(),
            expires_at: Utc::now(),
        };
        let events = message_published(&msg);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].channel, Channel::topic("task.created"));
        assert_eq!(events[1].channel, Channel::agent("dev-1"));
        assert!(events.iter().all(|n| n.is_critical()));
    }
}
