// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The in-memory client registry — the bridge's only shared mutable state.
//!
//! Four maps, all on `DashMap` so every loop (read loops, heartbeat,
//! retry sweeper, listener) can touch them without a global lock:
//!
//! - `clients`:   client id → handle (outbound sender, identity, activity)
//! - `channels`:  channel → subscriber set
//! - `prev_subs`: agent id → channel set from the previous connection
//! - `pending`:   (client id, event id) → at-least-once delivery entry
//!
//! Removal is idempotent: a client dropped by the heartbeat loop and its
//! own failed write race safely.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use swarmlink_proto::{Channel, Notification, ServerFrame};

/// Outbound queue depth per client; a slow consumer hits this before the
/// 2-second write timeout drops it.
pub const CLIENT_QUEUE: usize = 256;

/// Retry contract for critical events.
pub const RETRY_AFTER_SECS: u64 = 5;
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug)]
pub struct ClientHandle {
    pub agent_id: String,
    pub session_id: Option<String>,
    pub tx: mpsc::Sender<ServerFrame>,
    /// Fired on removal so the connection's read loop shuts the socket.
    pub closed: Arc<Notify>,
    pub last_activity: Mutex<Instant>,
    pub subscriptions: Mutex<HashSet<Channel>>,
}

#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub frame: ServerFrame,
    pub sent_at: Instant,
    pub attempts: u32,
}

#[derive(Default)]
pub struct Registry {
    clients: DashMap<Uuid, ClientHandle>,
    channels: DashMap<Channel, HashSet<Uuid>>,
    prev_subs: DashMap<String, HashSet<Channel>>,
    pending: DashMap<(Uuid, Uuid), PendingDelivery>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated client and auto-subscribe it: `global`,
    /// `agents/{agent_id}`, `sessions/{session_id}` if supplied, plus
    /// whatever channel set the agent held on its previous connection.
    pub fn register(
        &self,
        client_id: Uuid,
        agent_id: &str,
        session_id: Option<&str>,
        tx: mpsc::Sender<ServerFrame>,
        closed: Arc<Notify>,
    ) {
        let mut initial: HashSet<Channel> = HashSet::new();
        initial.insert(Channel::Global);
        initial.insert(Channel::agent(agent_id));
        if let Some(session) = session_id {
            initial.insert(Channel::session(session));
        }
        if let Some(previous) = self.prev_subs.get(agent_id) {
            initial.extend(previous.iter().cloned());
        }

        for channel in &initial {
            self.channels
                .entry(channel.clone())
                .or_default()
                .insert(client_id);
        }

        self.clients.insert(
            client_id,
            ClientHandle {
                agent_id: agent_id.to_string(),
                session_id: session_id.map(String::from),
                tx,
                closed,
                last_activity: Mutex::new(Instant::now()),
                subscriptions: Mutex::new(initial),
            },
        );
        info!(%client_id, agent = %agent_id, "client authenticated");
    }

    /// Remove a client from every index; returns whether it was present.
    /// The channel set is remembered per agent for reconnection.
    pub fn remove(&self, client_id: Uuid) -> bool {
        let Some((_, handle)) = self.clients.remove(&client_id) else {
            return false;
        };
        let subs = handle
            .subscriptions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        for channel in &subs {
            if let Some(mut set) = self.channels.get_mut(channel) {
                set.remove(&client_id);
            }
        }
        self.pending.retain(|(client, _), _| *client != client_id);
        self.prev_subs.insert(handle.agent_id.clone(), subs);
        handle.closed.notify_waiters();
        info!(%client_id, agent = %handle.agent_id, "client removed");
        true
    }

    pub fn subscribe(&self, client_id: Uuid, channel: Channel) -> bool {
        let Some(handle) = self.clients.get(&client_id) else {
            return false;
        };
        self.channels
            .entry(channel.clone())
            .or_default()
            .insert(client_id);
        if let Ok(mut subs) = handle.subscriptions.lock() {
            subs.insert(channel);
        }
        true
    }

    pub fn unsubscribe(&self, client_id: Uuid, channel: &Channel) -> bool {
        let Some(handle) = self.clients.get(&client_id) else {
            return false;
        };
        if let Some(mut set) = self.channels.get_mut(channel) {
            set.remove(&client_id);
        }
        if let Ok(mut subs) = handle.subscriptions.lock() {
            subs.remove(channel);
        }
        true
    }

    pub fn touch(&self, client_id: Uuid) {
        if let Some(handle) = self.clients.get(&client_id) {
            if let Ok(mut at) = handle.last_activity.lock() {
                *at = Instant::now();
            }
        }
    }

    pub fn is_registered(&self, client_id: Uuid) -> bool {
        self.clients.contains_key(&client_id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Clients whose subscription set intersects the published channel.
    /// `global` subscribers receive everything except `metrics`.
    fn receivers(&self, published: &Channel) -> Vec<Uuid> {
        let mut out: HashSet<Uuid> = HashSet::new();
        for entry in self.channels.iter() {
            if entry.key().matches(published) {
                out.extend(entry.value().iter().copied());
            }
        }
        out.into_iter().collect()
    }

    /// Fan a committed notification out to every matching client.
    ///
    /// Critical events (`task.`/`subtask.`/`message.` prefixes) get a
    /// pending entry per receiver for the at-least-once retry loop. The
    /// event id is one stable UUID shared by every receiver, so client-side
    /// dedup works across redeliveries.
    pub fn fan_out(&self, notification: &Notification) {
        let event_id = Uuid::new_v4();
        let frame = ServerFrame::Event {
            id: event_id,
            channel: notification.channel.to_string(),
            event: notification.event.clone(),
            data: notification.data.clone(),
            timestamp: notification.timestamp,
        };
        let critical = notification.is_critical();

        for client_id in self.receivers(&notification.channel) {
            let Some(handle) = self.clients.get(&client_id) else {
                continue;
            };
            match handle.tx.try_send(frame.clone()) {
                Ok(()) => {
                    if critical {
                        self.pending.insert(
                            (client_id, event_id),
                            PendingDelivery {
                                frame: frame.clone(),
                                sent_at: Instant::now(),
                                attempts: 1,
                            },
                        );
                    }
                }
                Err(e) => {
                    // One failed send disqualifies the whole client.
                    warn!(%client_id, "client send failed, dropping: {e}");
                    drop(handle);
                    self.remove(client_id);
                }
            }
        }
    }

    /// Ack from a client: the pending entry (if any) is done.
    pub fn ack(&self, client_id: Uuid, event_id: Uuid) -> bool {
        self.pending.remove(&(client_id, event_id)).is_some()
    }

    /// One pass of the retry sweeper: resend stale entries, drop exhausted
    /// ones. Returns (resent, dropped).
    pub fn sweep_pending(&self) -> (usize, usize) {
        let now = Instant::now();
        let mut resend: Vec<(Uuid, Uuid)> = Vec::new();
        let mut dead: Vec<(Uuid, Uuid)> = Vec::new();

        for entry in self.pending.iter() {
            if now.duration_since(entry.value().sent_at).as_secs() >= RETRY_AFTER_SECS {
                if entry.value().attempts >= MAX_ATTEMPTS {
                    dead.push(*entry.key());
                } else {
                    resend.push(*entry.key());
                }
            }
        }

        for key in &dead {
            if let Some(((client_id, event_id), entry)) = self.pending.remove(key) {
                warn!(
                    %client_id, %event_id, attempts = entry.attempts,
                    "dropping unacked critical event"
                );
            }
        }

        let mut resent = 0;
        for key @ (client_id, event_id) in &resend {
            let frame = match self.pending.get_mut(key) {
                Some(mut entry) => {
                    entry.attempts += 1;
                    entry.sent_at = now;
                    entry.frame.clone()
                }
                None => continue,
            };
            match self.clients.get(client_id) {
                Some(handle) => {
                    if handle.tx.try_send(frame).is_ok() {
                        resent += 1;
                        debug!(%client_id, %event_id, "critical event resent");
                    }
                }
                None => {
                    self.pending.remove(key);
                }
            }
        }
        (resent, dead.len())
    }

    /// Clients idle past the deadline, for the heartbeat loop to evict.
    pub fn idle_clients(&self, idle_after_secs: u64) -> Vec<Uuid> {
        let now = Instant::now();
        self.clients
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .last_activity
                    .lock()
                    .map(|at| now.duration_since(*at).as_secs() > idle_after_secs)
                    .unwrap_or(false)
            })
            .map(|entry| *entry.key())
            .collect()
    }

    /// Send a frame to every registered client (heartbeat pings).
    pub fn broadcast_frame(&self, frame: &ServerFrame) {
        let mut failed: Vec<Uuid> = Vec::new();
        for entry in self.clients.iter() {
            if entry.value().tx.try_send(frame.clone()).is_err() {
                failed.push(*entry.key());
            }
        }
        for client_id in failed {
            warn!(%client_id, "heartbeat send failed, dropping client");
            self.remove(client_id);
        }
    }

    /// Whether a (client, event) delivery is still pending — test hook.
    pub fn is_pending(&self, client_id: Uuid, event_id: Uuid) -> bool {
        self.pending.contains_key(&(client_id, event_id))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(registry: &Registry, agent: &str) -> (Uuid, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
        let id = Uuid::new_v4();
        registry.register(id, agent, Some("S1"), tx, Arc::new(Notify::new()));
        (id, rx)
    }

    fn event_frames(rx: &mut mpsc::Receiver<ServerFrame>) -> Vec<ServerFrame> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn register_auto_subscribes_the_three_lanes() {
        let registry = Registry::new();
        let (id, mut rx) = client(&registry, "dev-1");

        registry.fan_out(&Notification::new(Channel::Global, "action.created", json!({})));
        registry.fan_out(&Notification::new(Channel::agent("dev-1"), "x.y", json!({})));
        registry.fan_out(&Notification::new(Channel::session("S1"), "x.y", json!({})));
        registry.fan_out(&Notification::new(Channel::agent("other"), "x.y", json!({})));

        // agents/other is still delivered: the client subscribes to global,
        // and global receives agent-lane events.
        assert_eq!(event_frames(&mut rx).len(), 4);
        assert!(registry.is_registered(id));
    }

    #[test]
    fn metrics_do_not_reach_global_subscribers() {
        let registry = Registry::new();
        let (id, mut rx) = client(&registry, "dev-1");

        registry.fan_out(&Notification::new(Channel::Metrics, "metric.update", json!({})));
        assert!(event_frames(&mut rx).is_empty());

        registry.subscribe(id, Channel::Metrics);
        registry.fan_out(&Notification::new(Channel::Metrics, "metric.update", json!({})));
        assert_eq!(event_frames(&mut rx).len(), 1);
    }

    #[test]
    fn critical_events_are_tracked_until_acked() {
        let registry = Registry::new();
        let (id, mut rx) = client(&registry, "dev-1");

        registry.fan_out(&Notification::new(
            Channel::Global,
            "subtask.completed",
            json!({"subtask_id": "s"}),
        ));
        assert_eq!(registry.pending_count(), 1);

        let frames = event_frames(&mut rx);
        let ServerFrame::Event { id: event_id, .. } = &frames[0] else {
            panic!("expected event frame");
        };
        let event_id = *event_id;
        assert!(registry.ack(id, event_id));
        assert_eq!(registry.pending_count(), 0);
        assert!(!registry.ack(id, event_id), "double ack is a no-op");
    }

    #[test]
    fn non_critical_events_are_fire_and_forget() {
        let registry = Registry::new();
        let (_, mut rx) = client(&registry, "dev-1");
        registry.fan_out(&Notification::new(Channel::Global, "action.created", json!({})));
        assert_eq!(event_frames(&mut rx).len(), 1);
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn remove_clears_every_index_and_remembers_channels() {
        let registry = Registry::new();
        let (id, mut rx) = client(&registry, "dev-1");
        registry.subscribe(id, Channel::topic("task.created"));

        registry.fan_out(&Notification::new(Channel::Global, "subtask.running", json!({})));
        assert_eq!(registry.pending_count(), 1);

        assert!(registry.remove(id));
        assert!(!registry.is_registered(id));
        assert_eq!(registry.pending_count(), 0, "pending entries die with the client");
        assert!(!registry.remove(id), "second remove is a no-op");

        // Reconnection restores the remembered channel set.
        let (id2, _rx2) = client(&registry, "dev-1");
        drop(event_frames(&mut rx));
        let handle = registry.clients.get(&id2).unwrap();
        let subs = handle.subscriptions.lock().unwrap();
        assert!(subs.contains(&Channel::topic("task.created")));
    }

    #[test]
    fn sweep_resends_then_drops_after_three_attempts() {
        let registry = Registry::new();
        let (id, mut rx) = client(&registry, "dev-1");

        registry.fan_out(&Notification::new(Channel::Global, "task.created", json!({})));
        let (_, key) = {
            let entry = registry.pending.iter().next().unwrap();
            (entry.value().attempts, *entry.key())
        };

        // Not yet stale: nothing happens.
        assert_eq!(registry.sweep_pending(), (0, 0));

        // Age the entry artificially and sweep twice: two resends.
        for expected_attempts in [2u32, 3u32] {
            registry.pending.get_mut(&key).unwrap().sent_at =
                Instant::now() - std::time::Duration::from_secs(RETRY_AFTER_SECS + 1);
            let (resent, dropped) = registry.sweep_pending();
            assert_eq!((resent, dropped), (1, 0));
            assert_eq!(registry.pending.get(&key).unwrap().attempts, expected_attempts);
        }

        // Third stale pass: attempts exhausted, entry dropped.
        registry.pending.get_mut(&key).unwrap().sent_at =
            Instant::now() - std::time::Duration::from_secs(RETRY_AFTER_SECS + 1);
        let (resent, dropped) = registry.sweep_pending();
        assert_eq!((resent, dropped), (0, 1));
        assert_eq!(registry.pending_count(), 0);

        // Initial + 2 resends observed by the client.
        assert_eq!(event_frames(&mut rx).len(), 3);
        assert!(registry.is_registered(id), "drop is logged, client stays");
    }

    #[test]
    fn idle_clients_are_reported_for_eviction() {
        let registry = Registry::new();
        let (id, _rx) = client(&registry, "dev-1");
        assert!(registry.idle_clients(60).is_empty());

        *registry.clients.get(&id).unwrap().last_activity.lock().unwrap() =
            Instant::now() - std::time::Duration::from_secs(120);
        assert_eq!(registry.idle_clients(60), vec![id]);

        registry.touch(id);
        assert!(registry.idle_clients(60).is_empty());
    }
}
