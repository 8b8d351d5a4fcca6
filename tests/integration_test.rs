// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
/// Integration tests over the core logic that runs without a database:
/// the token envelope, the frame protocol, channel fan-out with
/// at-least-once retries, and brief generation including the compact
/// restore path.
use chrono::{Duration, Utc};
use serde_json::json;

use swarmlink_api::brief::{self, BriefInputs, BriefRequest};
use swarmlink_bridge::registry::{Registry, CLIENT_QUEUE, MAX_ATTEMPTS, RETRY_AFTER_SECS};
use swarmlink_proto::{
    sign_token, verify_token, Channel, ClientFrame, Notification, ServerFrame, TokenClaims,
    TokenError,
};
use tokio::sync::mpsc;
use uuid::Uuid;

const SECRET: &[u8] = b"integration-secret";

// ── Token lifecycle ───────────────────────────────────────────────────────────

#[test]
fn minted_token_authenticates_until_expiry() {
    let now = Utc::now();
    let claims = TokenClaims::issue("orc", Some("S1".into()), now);
    let token = sign_token(&claims, SECRET);

    let verified = verify_token(&token, SECRET, now + Duration::seconds(30)).unwrap();
    assert_eq!(verified.agent_id, "orc");
    assert_eq!(verified.session_id.as_deref(), Some("S1"));

    // Reuse after exp is refused with the AUTH_EXPIRED code.
    let err = verify_token(&token, SECRET, now + Duration::seconds(3601)).unwrap_err();
    assert_eq!(err, TokenError::Expired);
    assert_eq!(err.code(), "AUTH_EXPIRED");
}

#[test]
fn token_envelope_has_the_documented_shape() {
    let claims = TokenClaims::issue("orc", None, Utc::now());
    let token = sign_token(&claims, SECRET);
    let (payload, signature) = token.split_once('.').unwrap();

    // base64url payload, hex signature over it.
    assert!(!payload.contains('+') && !payload.contains('/'));
    assert_eq!(signature.len(), 64, "hex-encoded HMAC-SHA256");
    assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
}

// ── Frame protocol ────────────────────────────────────────────────────────────

#[test]
fn client_frames_round_trip_the_wire() {
    let frames = [
        r#"{"type":"auth","token":"a.b"}"#,
        r#"{"type":"subscribe","channel":"agents/dev-1","ts":1}"#,
        r#"{"type":"unsubscribe","channel":"global"}"#,
        r#"{"type":"publish","channel":"topics/task.created","event":"custom","data":{"k":1}}"#,
        r#"{"type":"ping","ts":2}"#,
        r#"{"type":"ack","message_id":"00000000-0000-0000-0000-000000000000"}"#,
    ];
    for raw in frames {
        let frame: ClientFrame = serde_json::from_str(raw).unwrap();
        let back = serde_json::to_string(&frame).unwrap();
        let _reparsed: ClientFrame = serde_json::from_str(&back).unwrap();
    }
}

// ── Fan-out and at-least-once delivery ────────────────────────────────────────

fn connect(registry: &Registry, agent: &str) -> (Uuid, mpsc::Receiver<ServerFrame>) {
    let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
    let id = Uuid::new_v4();
    registry.register(
        id,
        agent,
        None,
        tx,
        std::sync::Arc::new(tokio::sync::Notify::new()),
    );
    (id, rx)
}

fn drain(rx: &mut mpsc::Receiver<ServerFrame>) -> Vec<ServerFrame> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        out.push(frame);
    }
    out
}

#[test]
fn subtask_lifecycle_reaches_a_global_subscriber() {
    let registry = Registry::new();
    let (_, mut rx) = connect(&registry, "observer");

    for event in [
        "subtask.created",
        "subtask.running",
        "agent.connected",
        "subtask.completed",
        "agent.disconnected",
        "message.created",
    ] {
        registry.fan_out(&Notification::new(Channel::Global, event, json!({})));
    }

    let received: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter_map(|f| match f {
            ServerFrame::Event { event, .. } => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(
        received,
        [
            "subtask.created",
            "subtask.running",
            "agent.connected",
            "subtask.completed",
            "agent.disconnected",
            "message.created",
        ]
    );
}

#[test]
fn ack_inside_the_retry_window_stops_redelivery() {
    let registry = Registry::new();
    let (client_id, mut rx) = connect(&registry, "dev-1");

    registry.fan_out(&Notification::new(
        Channel::Global,
        "subtask.completed",
        json!({"subtask_id": "s1"}),
    ));
    assert_eq!(registry.pending_count(), 1, "critical events are tracked");

    // Exactly one copy arrives; the entry is still young, so a sweep now
    // (inside the 5 s window) resends nothing.
    assert_eq!(RETRY_AFTER_SECS, 5);
    assert_eq!(MAX_ATTEMPTS, 3);
    let frames = drain(&mut rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(registry.sweep_pending(), (0, 0));

    // Ack within the window: the entry is retired, later sweeps are no-ops.
    let ServerFrame::Event { id, .. } = &frames[0] else {
        panic!("expected an event frame");
    };
    assert!(registry.ack(client_id, *id));
    assert_eq!(registry.pending_count(), 0);
    assert_eq!(registry.sweep_pending(), (0, 0));
    assert!(drain(&mut rx).is_empty(), "no further copies after the ack");
}

#[test]
fn evicted_client_receives_nothing_while_others_continue() {
    let registry = Registry::new();
    let (a, mut rx_a) = connect(&registry, "A");
    let (_b, mut rx_b) = connect(&registry, "B");

    registry.remove(a);
    registry.fan_out(&Notification::new(Channel::Global, "action.created", json!({})));

    assert!(drain(&mut rx_a).is_empty(), "evicted client gets nothing");
    assert_eq!(drain(&mut rx_b).len(), 1, "the other client still receives");
}

// ── Brief generation (compact restore scenario) ───────────────────────────────

#[test]
fn compact_restore_brief_carries_snapshot_and_summary() {
    let req = BriefRequest {
        session_id: "S2".into(),
        agent_id: "orc".into(),
        agent_type: Some("orchestrator".into()),
        max_tokens: None,
        include_history: true,
        include_messages: true,
        include_blocking: true,
        history_limit: None,
    };
    let inputs = BriefInputs {
        snapshot: Some(json!({
            "trigger": "auto",
            "active_tasks": [{"id": "T1", "description": "auth", "status": "in_progress"}],
            "modified_files": ["a.ts"],
        })),
        previous_summary: Some("jwt chosen".into()),
        ..Default::default()
    };

    let result = brief::generate(&req, &inputs, Utc::now());

    assert!(result.content.contains("### Task T1 — auth (in_progress)"));
    assert!(result.content.contains("`a.ts`"));
    let idx = result.content.find("## Previous Context Summary").unwrap();
    assert!(result.content[idx..].contains("jwt chosen"));
    assert!(!result.truncated, "this data easily fits the default budget");
    assert!(
        result.content.chars().count() <= 2000 * 4,
        "default budget bounds the brief at roughly 8000 chars"
    );
    assert!(result.sources.contains(&"compact-snapshot".to_string()));
}

#[test]
fn brief_budget_is_clamped_and_enforced_end_to_end() {
    let req = BriefRequest {
        session_id: "S".into(),
        agent_id: "v".into(),
        agent_type: None,
        max_tokens: Some(50), // below the floor — clamps to 100
        include_history: false,
        include_messages: false,
        include_blocking: false,
        history_limit: None,
    };
    let inputs = BriefInputs {
        previous_summary: Some("word ".repeat(2000)),
        ..Default::default()
    };
    let result = brief::generate(&req, &inputs, Utc::now());
    assert!(result.truncated);
    assert!(result.token_count <= 120);
}
