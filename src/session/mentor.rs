//! Mentor-side queue session.
//!
//! Mentors see every open ticket on connect, then every queue change as
//! it happens. Claim, unclaim and complete arrive as frames over the same
//! socket; each carries the ticket id it applies to.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::mentors::Mentor;
use crate::server::AppState;
use crate::session::HyperWebSocket;
use crate::store::TransitionResult;
use crate::ticket::{PayloadFormat, Ticket, TicketEvent};
use crate::types::Result;

/// Frame a mentor may send over the socket.
#[derive(Debug, Deserialize)]
struct MentorFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    ticket: Option<String>,
}

/// Drive a mentor socket until the peer leaves.
pub async fn run_mentor_session(
    ws: HyperWebSocket,
    mentor: Mentor,
    format: PayloadFormat,
    state: Arc<AppState>,
) -> Result<()> {
    let (tx, updates) = mpsc::unbounded_channel();
    let added_tx = tx.clone();
    let added = state.hub.subscribe_added(move |ticket| {
        let _ = added_tx.send(ticket.clone());
    });
    let all_updates = state.hub.subscribe_all_updates(move |ticket| {
        let _ = tx.send(ticket.clone());
    });

    info!("Mentor {} connected", mentor.name);
    let result = mentor_loop(ws, &mentor, format, &state, updates).await;
    state.hub.unsubscribe(&added);
    state.hub.unsubscribe(&all_updates);
    info!("Mentor {} session closed", mentor.name);

    result
}

async fn mentor_loop(
    ws: HyperWebSocket,
    mentor: &Mentor,
    format: PayloadFormat,
    state: &AppState,
    mut updates: mpsc::UnboundedReceiver<Ticket>,
) -> Result<()> {
    let (mut sender, mut receiver) = ws.split();

    // Replay runs after the subscriptions are in place, so a ticket
    // created while we connect is seen at least once. The feed is
    // at-least-once; clients key on the ticket id.
    for ticket in state.store.open_tickets().await? {
        sender
            .send(WsMessage::Text(format.encode(&ticket.to_mentor_dto())?))
            .await?;
    }

    let mut ping = interval(state.args.ping_interval());

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break };
                if sender
                    .send(WsMessage::Text(format.encode(&update.to_mentor_dto())?))
                    .await
                    .is_err()
                {
                    break;
                }
            }

            frame = receiver.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        let frame = match format.decode::<MentorFrame>(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!("Malformed frame from mentor {}: {}", mentor.user_id, e);
                                continue;
                            }
                        };
                        let Some(ticket_id) = frame.ticket.as_deref() else {
                            warn!(
                                "Frame type {:?} from mentor {} names no ticket",
                                frame.kind, mentor.user_id
                            );
                            continue;
                        };
                        let event = match frame.kind.as_str() {
                            "claim" => TicketEvent::Claim(mentor.mentor_ref()),
                            "unclaim" => TicketEvent::Unclaim {
                                mentor_id: mentor.user_id.clone(),
                            },
                            "complete" => TicketEvent::Complete {
                                mentor_id: mentor.user_id.clone(),
                            },
                            other => {
                                warn!(
                                    "Unsupported frame type {:?} from mentor {}",
                                    other, mentor.user_id
                                );
                                continue;
                            }
                        };
                        match state.store.transition(ticket_id, event).await {
                            // Direct echo; the broadcast copy may arrive too.
                            Ok(TransitionResult::Updated(ticket)) => {
                                if sender
                                    .send(WsMessage::Text(format.encode(&ticket.to_mentor_dto())?))
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Ok(TransitionResult::Rejected(ticket)) => {
                                debug!(
                                    "Mentor {} rejected on ticket {} ({})",
                                    mentor.user_id, ticket.id, ticket.status
                                );
                            }
                            Ok(TransitionResult::NotFound) => {
                                debug!(
                                    "Mentor {} referenced unknown ticket {}",
                                    mentor.user_id, ticket_id
                                );
                            }
                            Err(e) => {
                                warn!("Transition of ticket {} failed: {}", ticket_id, e);
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = sender.send(WsMessage::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for mentor {}: {}", mentor.user_id, e);
                        break;
                    }
                    _ => {}
                }
            }

            _ = ping.tick() => {
                if sender.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sender.send(WsMessage::Close(None)).await;
    Ok(())
}
