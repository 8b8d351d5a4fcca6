// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The four brief templates and their slot filling.
//!
//! Template selection is a substring match on `agent_type`:
//! `orchestrator`/`tech-lead` get the wave-and-fleet view, coding agents
//! (`developer`/`backend`/`frontend`) get current-task-and-files, a
//! `specialist` gets a focus view, and everything else falls back to the
//! validator template.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::BriefInputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Orchestrator,
    Developer,
    Specialist,
    Validator,
}

pub fn select(agent_type: Option<&str>) -> TemplateKind {
    let Some(agent_type) = agent_type else {
        return TemplateKind::Validator;
    };
    let t = agent_type.to_lowercase();
    if t.contains("orchestrator") || t.contains("tech-lead") {
        TemplateKind::Orchestrator
    } else if t.contains("developer") || t.contains("backend") || t.contains("frontend") {
        TemplateKind::Developer
    } else if t.contains("specialist") {
        TemplateKind::Specialist
    } else {
        TemplateKind::Validator
    }
}

pub fn render(kind: TemplateKind, agent_id: &str, inputs: &BriefInputs) -> String {
    let mut doc = String::new();
    match kind {
        TemplateKind::Orchestrator => {
            let _ = writeln!(doc, "# Orchestration Brief — {agent_id}");
            session_section(&mut doc, inputs);
            wave_section(&mut doc, inputs);
            fleet_section(&mut doc, inputs);
        }
        TemplateKind::Developer => {
            let _ = writeln!(doc, "# Work Brief — {agent_id}");
            session_section(&mut doc, inputs);
            current_task_section(&mut doc, inputs);
            file_edits_section(&mut doc, inputs);
        }
        TemplateKind::Specialist => {
            let _ = writeln!(doc, "# Specialist Brief — {agent_id}");
            session_section(&mut doc, inputs);
            current_task_section(&mut doc, inputs);
        }
        TemplateKind::Validator => {
            let _ = writeln!(doc, "# Validation Brief — {agent_id}");
            session_section(&mut doc, inputs);
            subtask_list_section(&mut doc, inputs, "## Subtasks Under Review");
        }
    }

    snapshot_sections(&mut doc, inputs);
    messages_section(&mut doc, inputs);
    blocking_section(&mut doc, inputs);
    history_section(&mut doc, inputs, kind);
    previous_summary_section(&mut doc, inputs);
    doc
}

// ── Shared sections ───────────────────────────────────────────────────────────

fn session_section(doc: &mut String, inputs: &BriefInputs) {
    let _ = writeln!(doc, "\n## Session");
    match (&inputs.session, &inputs.project) {
        (Some(session), project) => {
            let path = project.as_ref().map(|p| p.path.as_str()).unwrap_or("?");
            let _ = writeln!(
                doc,
                "- `{}` in `{}` — {} tool calls, {} ok / {} failed",
                session.id,
                path,
                session.total_tools_used,
                session.total_success,
                session.total_errors
            );
        }
        (None, _) => {
            let _ = writeln!(doc, "- session not found in the store");
        }
    }
}

fn wave_section(doc: &mut String, inputs: &BriefInputs) {
    let _ = writeln!(doc, "\n## Wave Status");
    if inputs.subtasks.is_empty() {
        let _ = writeln!(doc, "- no active subtasks");
        return;
    }
    let mut by_status: BTreeMap<&str, usize> = BTreeMap::new();
    for st in &inputs.subtasks {
        *by_status.entry(st.status.as_str()).or_default() += 1;
    }
    for (status, count) in by_status {
        let _ = writeln!(doc, "- {count} {status}");
    }
}

fn fleet_section(doc: &mut String, inputs: &BriefInputs) {
    let _ = writeln!(doc, "\n## Cross-Agent Status");
    if inputs.subtasks.is_empty() {
        let _ = writeln!(doc, "- no agents working");
        return;
    }
    for st in &inputs.subtasks {
        let agent = st.agent_id.as_deref().unwrap_or("unassigned");
        let kind = st.agent_type.as_deref().unwrap_or("?");
        let _ = writeln!(doc, "- **{agent}** ({kind}) — {}: {}", st.status, st.description);
    }
}

fn current_task_section(doc: &mut String, inputs: &BriefInputs) {
    let _ = writeln!(doc, "\n## Current Task");
    match inputs.subtasks.first() {
        Some(st) => {
            let _ = writeln!(doc, "- {} (`{}`, {})", st.description, st.id, st.status);
            for blocked in &st.blocked_by {
                let _ = writeln!(doc, "  - waiting on `{blocked}`");
            }
        }
        None => {
            let _ = writeln!(doc, "- nothing assigned");
        }
    }
    if inputs.subtasks.len() > 1 {
        subtask_list_section(doc, inputs, "## Also Active");
    }
}

fn subtask_list_section(doc: &mut String, inputs: &BriefInputs, heading: &str) {
    let _ = writeln!(doc, "\n{heading}");
    if inputs.subtasks.is_empty() {
        let _ = writeln!(doc, "- none");
        return;
    }
    for st in &inputs.subtasks {
        let _ = writeln!(doc, "- `{}` {} — {}", st.id, st.status, st.description);
    }
}

fn file_edits_section(doc: &mut String, inputs: &BriefInputs) {
    let _ = writeln!(doc, "\n## Recent File Edits");
    let mut seen: Vec<&str> = Vec::new();
    for action in &inputs.actions {
        for path in &action.file_paths {
            if !seen.contains(&path.as_str()) {
                seen.push(path);
            }
        }
    }
    if seen.is_empty() {
        let _ = writeln!(doc, "- none recorded");
        return;
    }
    for path in seen.iter().take(20) {
        let _ = writeln!(doc, "- `{path}`");
    }
}

fn messages_section(doc: &mut String, inputs: &BriefInputs) {
    if inputs.messages.is_empty() {
        return;
    }
    let _ = writeln!(doc, "\n## Unread Messages");
    for msg in &inputs.messages {
        let target = if msg.to_agent.is_some() { "to you" } else { "broadcast" };
        let _ = writeln!(
            doc,
            "- [{}] **{}** from `{}` ({target}, prio {})",
            msg.topic, summarize_payload(&msg.payload), msg.from_agent, msg.priority
        );
    }
}

fn blocking_section(doc: &mut String, inputs: &BriefInputs) {
    if inputs.blockings.is_empty() {
        return;
    }
    let _ = writeln!(doc, "\n## Blockings");
    for b in &inputs.blockings {
        let reason = b.reason.as_deref().unwrap_or("no reason given");
        let _ = writeln!(doc, "- blocked by `{}`: {reason}", b.blocker);
    }
}

fn history_section(doc: &mut String, inputs: &BriefInputs, kind: TemplateKind) {
    if inputs.actions.is_empty() {
        return;
    }
    let _ = writeln!(doc, "\n## Recent Actions");
    for action in &inputs.actions {
        match kind {
            // Validators care about outcomes.
            TemplateKind::Validator => {
                let outcome = match action.exit_code {
                    Some(0) => "ok",
                    Some(_) => "failed",
                    None => "?",
                };
                let _ = writeln!(doc, "- {} [{}] ({outcome})", action.tool_name, action.tool_type);
            }
            _ => {
                let _ = writeln!(doc, "- {} [{}]", action.tool_name, action.tool_type);
            }
        }
    }
}

/// Sections filled from a saved compact snapshot, when one is present.
fn snapshot_sections(doc: &mut String, inputs: &BriefInputs) {
    let Some(snapshot) = &inputs.snapshot else { return };

    if let Some(summary) = snapshot.get("context_summary").and_then(|v| v.as_str()) {
        if !summary.is_empty() {
            let _ = writeln!(doc, "\n## Saved Context");
            let _ = writeln!(doc, "{summary}");
        }
    }

    if let Some(tasks) = snapshot.get("active_tasks").and_then(|v| v.as_array()) {
        if !tasks.is_empty() {
            let _ = writeln!(doc, "\n## Saved Tasks");
            for task in tasks {
                let id = task.get("id").and_then(|v| v.as_str()).unwrap_or("?");
                let desc = task
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let status = task.get("status").and_then(|v| v.as_str()).unwrap_or("?");
                let _ = writeln!(doc, "\n### Task {id} — {desc} ({status})");
            }
        }
    }

    if let Some(files) = snapshot.get("modified_files").and_then(|v| v.as_array()) {
        if !files.is_empty() {
            let _ = writeln!(doc, "\n## Modified Files");
            for file in files {
                if let Some(path) = file.as_str() {
                    let _ = writeln!(doc, "- `{path}`");
                }
            }
        }
    }

    if let Some(decisions) = snapshot.get("key_decisions").and_then(|v| v.as_array()) {
        if !decisions.is_empty() {
            let _ = writeln!(doc, "\n## Key Decisions");
            for decision in decisions {
                if let Some(text) = decision.as_str() {
                    let _ = writeln!(doc, "- {text}");
                }
            }
        }
    }
}

fn previous_summary_section(doc: &mut String, inputs: &BriefInputs) {
    if let Some(summary) = &inputs.previous_summary {
        let _ = writeln!(doc, "\n## Previous Context Summary");
        let _ = writeln!(doc, "{summary}");
    }
}

fn summarize_payload(payload: &serde_json::Value) -> String {
    let text = payload
        .get("content")
        .or_else(|| payload.get("summary"))
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| payload.to_string());
    if text.chars().count() > 120 {
        let mut s: String = text.chars().take(119).collect();
        s.push('…');
        s
    } else {
        text
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_matches_substrings() {
        assert_eq!(select(Some("orchestrator")), TemplateKind::Orchestrator);
        assert_eq!(select(Some("senior-tech-lead")), TemplateKind::Orchestrator);
        assert_eq!(select(Some("backend-developer")), TemplateKind::Developer);
        assert_eq!(select(Some("frontend")), TemplateKind::Developer);
        assert_eq!(select(Some("security-specialist")), TemplateKind::Specialist);
        assert_eq!(select(Some("qa")), TemplateKind::Validator);
        assert_eq!(select(None), TemplateKind::Validator);
    }

    #[test]
    fn selection_is_case_insensitive() {
        assert_eq!(select(Some("Orchestrator")), TemplateKind::Orchestrator);
        assert_eq!(select(Some("BACKEND")), TemplateKind::Developer);
    }

    #[test]
    fn every_template_opens_with_a_title() {
        let inputs = BriefInputs::default();
        for (kind, title) in [
            (TemplateKind::Orchestrator, "# Orchestration Brief"),
            (TemplateKind::Developer, "# Work Brief"),
            (TemplateKind::Specialist, "# Specialist Brief"),
            (TemplateKind::Validator, "# Validation Brief"),
        ] {
            let doc = render(kind, "agent-x", &inputs);
            assert!(doc.starts_with(title), "{kind:?} must start with {title}");
            assert!(doc.contains("## Session"));
        }
    }

    #[test]
    fn snapshot_tasks_get_their_own_headers() {
        let inputs = BriefInputs {
            snapshot: Some(serde_json::json!({
                "active_tasks": [
                    {"id": "T1", "description": "auth", "status": "in_progress"}
                ],
                "modified_files": ["a.ts"],
            })),
            ..Default::default()
        };
        let doc = render(TemplateKind::Orchestrator, "orc", &inputs);
        assert!(doc.contains("### Task T1 — auth (in_progress)"));
        assert!(doc.contains("- `a.ts`"));
    }

    #[test]
    fn previous_summary_lands_under_its_heading() {
        let inputs = BriefInputs {
            previous_summary: Some("jwt chosen".into()),
            ..Default::default()
        };
        let doc = render(TemplateKind::Developer, "dev", &inputs);
        let idx = doc.find("## Previous Context Summary").unwrap();
        assert!(doc[idx..].contains("jwt chosen"));
    }
}
