use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

use murmur_types::events::{ClientEvent, ServerEvent};

use crate::dispatcher::Dispatcher;
use crate::gatekeeper::AuthenticatedUser;
use crate::registry::ConnectionHandle;
use crate::session::ClientSession;

/// Consecutive unanswered pings before the connection is dropped.
const MAX_MISSED_PONGS: u8 = 2;

/// Drive one admitted WebSocket connection until it closes.
///
/// Admission already happened at the HTTP upgrade, so the socket starts
/// straight at `ready`. Inbound frames are handled one at a time, in order;
/// an event being handled always runs to completion before the disconnect
/// is processed.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    user: AuthenticatedUser,
    heartbeat_interval: Duration,
) {
    let (sender, mut receiver) = socket.split();
    let (handle, events_rx) = ConnectionHandle::channel();

    info!(
        "{} ({}) connected to gateway [conn={}]",
        user.username,
        user.user_id,
        handle.conn_id()
    );

    handle.push(ServerEvent::Ready {
        user_id: user.user_id,
        username: user.username.clone(),
    });

    let pong_received = Arc::new(AtomicBool::new(true));
    let mut send_task = tokio::spawn(write_loop(
        sender,
        events_rx,
        pong_received.clone(),
        heartbeat_interval,
    ));

    let mut session = ClientSession::new(dispatcher, user, handle);

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            frame = receiver.next() => {
                let msg = match frame {
                    Some(Ok(msg)) => msg,
                    _ => break,
                };
                match msg {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientEvent>(text.as_str()) {
                            Ok(event) => session.handle_event(event).await,
                            Err(e) => {
                                let user = session.user();
                                warn!(
                                    "{} ({}) bad event ({} bytes): {}",
                                    user.username,
                                    user.user_id,
                                    text.len(),
                                    e
                                );
                            }
                        }
                    }
                    Message::Pong(_) => pong_received.store(true, Ordering::Release),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    send_task.abort();
    session.close().await;
}

/// Forward queued events to the socket and keep the heartbeat going.
/// Returns when the socket fails, the heartbeat times out, or every
/// handle is gone.
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut events_rx: mpsc::UnboundedReceiver<ServerEvent>,
    pong_received: Arc<AtomicBool>,
    heartbeat_interval: Duration,
) {
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode {} event: {}", event.kind(), e);
                        continue;
                    }
                };
                trace!("-> {}", event.kind());
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if pong_received.swap(false, Ordering::Acquire) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= MAX_MISSED_PONGS {
                        warn!(
                            "Heartbeat timeout (missed {} pongs), dropping connection",
                            missed_heartbeats
                        );
                        break;
                    }
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sender.close().await;
}
