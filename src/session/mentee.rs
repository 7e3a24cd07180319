//! Mentee-side ticket session.
//!
//! The socket tracks exactly one ticket. The client receives the current
//! snapshot on connect and a fresh snapshot after every change; the only
//! frame it may send is a cancel request. Once the ticket reaches a
//! terminal status the session lingers for the configured drain delay so
//! the closing update is delivered, then shuts down.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{info, warn};

use crate::server::AppState;
use crate::session::HyperWebSocket;
use crate::ticket::{PayloadFormat, Ticket, TicketEvent};
use crate::types::Result;

/// Frame a mentee may send over the socket.
#[derive(Debug, Deserialize)]
struct MenteeFrame {
    #[serde(rename = "type")]
    kind: String,
}

/// Drive a mentee socket until the ticket drains or the peer leaves.
pub async fn run_mentee_session(
    ws: HyperWebSocket,
    ticket: Ticket,
    format: PayloadFormat,
    state: Arc<AppState>,
) -> Result<()> {
    let ticket_id = ticket.id.clone();

    let (tx, updates) = mpsc::unbounded_channel();
    let subscription = state.hub.subscribe_ticket(&ticket_id, move |ticket| {
        let _ = tx.send(ticket.clone());
    });

    info!("Mentee connected to ticket {}", ticket_id);
    let result = mentee_loop(ws, ticket, format, &state, updates).await;
    state.hub.unsubscribe(&subscription);
    info!("Mentee session on ticket {} closed", ticket_id);

    result
}

async fn mentee_loop(
    ws: HyperWebSocket,
    ticket: Ticket,
    format: PayloadFormat,
    state: &AppState,
    mut updates: mpsc::UnboundedReceiver<Ticket>,
) -> Result<()> {
    let (mut sender, mut receiver) = ws.split();
    let ticket_id = ticket.id.clone();

    // Current snapshot first, whatever state the ticket is in.
    sender
        .send(WsMessage::Text(format.encode(&ticket.to_dto())?))
        .await?;

    // The drain timer only runs once the ticket is terminal; until then
    // the branch below is disabled and the sleep is never polled.
    let mut draining = ticket.status.is_terminal();
    let drain = sleep(state.args.drain_delay());
    tokio::pin!(drain);

    let mut ping = interval(state.args.ping_interval());

    loop {
        tokio::select! {
            _ = &mut drain, if draining => break,

            update = updates.recv() => {
                let Some(update) = update else { break };
                if sender
                    .send(WsMessage::Text(format.encode(&update.to_dto())?))
                    .await
                    .is_err()
                {
                    break;
                }
                if update.status.is_terminal() && !draining {
                    draining = true;
                    drain.as_mut().reset(Instant::now() + state.args.drain_delay());
                }
            }

            frame = receiver.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match format.decode::<MenteeFrame>(&text) {
                            Ok(frame) if frame.kind == "cancel" => {
                                if let Err(e) = state
                                    .store
                                    .transition(&ticket_id, TicketEvent::Cancel)
                                    .await
                                {
                                    warn!("Cancel of ticket {} failed: {}", ticket_id, e);
                                }
                            }
                            Ok(frame) => {
                                warn!(
                                    "Unsupported frame type {:?} from mentee on ticket {}",
                                    frame.kind, ticket_id
                                );
                            }
                            Err(e) => {
                                warn!("Malformed frame from mentee on ticket {}: {}", ticket_id, e);
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = sender.send(WsMessage::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error on ticket {}: {}", ticket_id, e);
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
