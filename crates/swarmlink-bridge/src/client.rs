// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! One WebSocket client: upgrade, auth state machine, read loop, and the
//! serialized outbound write loop.
//!
//! # Connection state machine
//!
//! ```text
//! new ──auth ok──► authenticated ──subscribe*──► {subscribed}
//!  │                    │
//!  │ any other frame    │ send failure / 2 s write stall / 60 s silence
//!  ▼                    ▼
//! error{UNAUTHENTICATED}    closed, removed from every index
//! ```
//!
//! Authentication accepts a signed token (query parameter `?token=` or an
//! `auth` frame) and, in dev mode only, a bare `{agent_id}` frame.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures::stream::StreamExt;
use futures::SinkExt;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use swarmlink_proto::token::verify_token;
use swarmlink_proto::{Channel, ClientFrame, Notification, ServerFrame};

use crate::registry::CLIENT_QUEUE;
use crate::BridgeContext;

/// A send that stalls longer than this drops the client.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle one socket from upgrade to close. `query_token` is the optional
/// `?token=` connection parameter, which counts as an auth frame.
pub async fn handle_socket(socket: WebSocket, ctx: Arc<BridgeContext>, query_token: Option<String>) {
    let client_id = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(CLIENT_QUEUE);
    // Fired by the registry on eviction so this task closes the socket even
    // when the client never sends another byte.
    let closed = Arc::new(Notify::new());

    // Outbound write loop: the only task writing to this socket. Closing
    // the channel (client removed from the registry) ends it.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            match tokio::time::timeout(WRITE_TIMEOUT, ws_tx.send(Message::Text(text))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(%client_id, "socket write failed: {e}");
                    break;
                }
                Err(_) => {
                    warn!(%client_id, "socket write stalled past 2 s, closing");
                    break;
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let mut authed = false;

    // A `?token=` parameter authenticates before the first frame.
    if let Some(token) = query_token {
        authed = try_auth(&ctx, client_id, &tx, &closed, Some(token), None, None).await;
        if !authed {
            // Error frame already queued; give the writer a moment.
            tokio::time::sleep(Duration::from_millis(50)).await;
            ctx.registry.remove(client_id);
            writer.abort();
            return;
        }
    }

    loop {
        let message = tokio::select! {
            message = ws_rx.next() => match message {
                Some(message) => message,
                None => break,
            },
            // Evicted (heartbeat, failed send): stop reading, close.
            _ = closed.notified() => break,
        };
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                ctx.registry.touch(client_id);
                continue;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue, // binary frames ignored
        };

        let frame = match serde_json::from_str::<ClientFrame>(&text) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = tx
                    .send(ServerFrame::error("BAD_FRAME", format!("invalid frame: {e}")))
                    .await;
                continue;
            }
        };

        ctx.registry.touch(client_id);

        if !authed {
            match frame {
                ClientFrame::Auth {
                    token,
                    agent_id,
                    session_id,
                    ..
                } => {
                    authed =
                        try_auth(&ctx, client_id, &tx, &closed, token, agent_id, session_id).await;
                }
                ClientFrame::Ping { .. } => {
                    let _ = tx.send(ServerFrame::Pong { timestamp: Utc::now() }).await;
                }
                _ => {
                    let _ = tx
                        .send(ServerFrame::error(
                            "UNAUTHENTICATED",
                            "authenticate before sending frames",
                        ))
                        .await;
                }
            }
            continue;
        }

        dispatch(&ctx, client_id, &tx, frame).await;

        // The heartbeat or a failed send may have evicted us mid-loop.
        if !ctx.registry.is_registered(client_id) {
            break;
        }
    }

    ctx.registry.remove(client_id);
    writer.abort();
    info!(%client_id, "connection closed");
}

/// Validate credentials and register the client. Queues `connected` on
/// success, an `error` frame (with the token error code) on failure.
async fn try_auth(
    ctx: &BridgeContext,
    client_id: Uuid,
    tx: &mpsc::Sender<ServerFrame>,
    closed: &Arc<Notify>,
    token: Option<String>,
    agent_id: Option<String>,
    session_id: Option<String>,
) -> bool {
    let identity = match token {
        Some(token) => match &ctx.secret {
            Some(secret) => match verify_token(&token, secret, Utc::now()) {
                Ok(claims) => Ok((claims.agent_id, claims.session_id)),
                Err(e) => Err((e.code(), e.to_string())),
            },
            None => Err(("AUTH_UNAVAILABLE", "no signing secret configured".to_string())),
        },
        None if ctx.dev_mode => match agent_id {
            Some(agent_id) if !agent_id.is_empty() => Ok((agent_id, session_id)),
            _ => Err(("AUTH_INVALID", "agent_id required in dev mode".to_string())),
        },
        None => Err((
            "AUTH_REQUIRED",
            "a signed token is required (dev mode is off)".to_string(),
        )),
    };

    match identity {
        Ok((agent_id, session_id)) => {
            ctx.registry.register(
                client_id,
                &agent_id,
                session_id.as_deref(),
                tx.clone(),
                closed.clone(),
            );
            let _ = tx
                .send(ServerFrame::Connected {
                    client_id,
                    timestamp: Utc::now(),
                })
                .await;
            true
        }
        Err((code, message)) => {
            warn!(%client_id, code, "authentication failed");
            let _ = tx.send(ServerFrame::error(code, message)).await;
            false
        }
    }
}

/// Post-auth frame dispatch.
async fn dispatch(
    ctx: &BridgeContext,
    client_id: Uuid,
    tx: &mpsc::Sender<ServerFrame>,
    frame: ClientFrame,
) {
    match frame {
        ClientFrame::Auth { .. } => {
            // Already authenticated; harmless, acknowledge idempotently.
            let _ = tx
                .send(ServerFrame::Connected {
                    client_id,
                    timestamp: Utc::now(),
                })
                .await;
        }
        ClientFrame::Subscribe { channel, .. } => {
            let ack = match channel.parse::<Channel>() {
                Ok(parsed) => {
                    ctx.registry.subscribe(client_id, parsed);
                    ServerFrame::ack_ok(format!("subscribe:{channel}"))
                }
                Err(e) => ServerFrame::ack_err(format!("subscribe:{channel}"), e.to_string()),
            };
            let _ = tx.send(ack).await;
        }
        ClientFrame::Unsubscribe { channel, .. } => {
            let ack = match channel.parse::<Channel>() {
                Ok(parsed) => {
                    ctx.registry.unsubscribe(client_id, &parsed);
                    ServerFrame::ack_ok(format!("unsubscribe:{channel}"))
                }
                Err(e) => ServerFrame::ack_err(format!("unsubscribe:{channel}"), e.to_string()),
            };
            let _ = tx.send(ack).await;
        }
        ClientFrame::Publish {
            channel,
            event,
            data,
            ..
        } => {
            let ack = match channel.parse::<Channel>() {
                Ok(parsed) => {
                    ctx.registry
                        .fan_out(&Notification::new(parsed, event.clone(), data));
                    ServerFrame::ack_ok(format!("publish:{event}"))
                }
                Err(e) => ServerFrame::ack_err(format!("publish:{event}"), e.to_string()),
            };
            let _ = tx.send(ack).await;
        }
        ClientFrame::Ping { .. } => {
            let _ = tx.send(ServerFrame::Pong { timestamp: Utc::now() }).await;
        }
        ClientFrame::Ack { message_id, .. } => {
            if !ctx.registry.ack(client_id, message_id) {
                debug!(%client_id, %message_id, "ack for unknown delivery");
            }
        }
    }
}
