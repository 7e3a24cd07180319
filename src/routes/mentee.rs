//! Mentee-facing ticket endpoints.
//!
//! A mentee opens a ticket with a plain POST or by connecting straight to
//! the WebSocket endpoint with the ticket arguments in the query string.
//! Responses come back JSON or form-encoded, whichever the Accept header
//! asks for.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{header, Request, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};

use crate::routes::{
    bad_request_response, internal_error_response, not_found_response, payload_response,
};
use crate::server::AppState;
use crate::session::run_mentee_session;
use crate::store::TicketCreate;
use crate::ticket::{PayloadFormat, Ticket};

/// Negotiated response format from the Accept header.
fn accept_format(req: &Request<Incoming>) -> PayloadFormat {
    PayloadFormat::from_accept(
        req.headers()
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok()),
    )
}

/// Request body format from the Content-Type header.
fn content_format(req: &Request<Incoming>) -> PayloadFormat {
    PayloadFormat::from_accept(
        req.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    )
}

/// Handle ticket creation (POST /mentee)
///
/// Arguments come from the query string when present, otherwise from the
/// request body in the Content-Type format.
pub async fn handle_create_ticket(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let respond = accept_format(&req);
    let content = content_format(&req);

    let query = req.uri().query().unwrap_or("").to_string();
    let args: TicketCreate = if !query.is_empty() {
        match serde_urlencoded::from_str(&query) {
            Ok(args) => args,
            Err(e) => return bad_request_response(&format!("Invalid query: {}", e)),
        }
    } else {
        let bytes = match req.collect().await {
            Ok(body) => body.to_bytes(),
            Err(e) => return bad_request_response(&format!("Failed to read body: {}", e)),
        };
        match content.decode(&String::from_utf8_lossy(&bytes)) {
            Ok(args) => args,
            Err(e) => return bad_request_response(&e.to_string()),
        }
    };

    if args.user_id.is_empty() {
        return bad_request_response("userId is required");
    }

    match state.store.create(args).await {
        Ok(Some(ticket)) => payload_response(respond, &ticket.to_dto()),
        Ok(None) => not_found_response("unknown user"),
        Err(e) => {
            error!("Ticket creation failed: {}", e);
            internal_error_response("ticket creation failed")
        }
    }
}

/// Handle ticket lookup (GET /mentee/{ticket})
pub async fn handle_get_ticket(
    state: Arc<AppState>,
    req: Request<Incoming>,
    ticket_id: &str,
) -> Response<Full<Bytes>> {
    let format = accept_format(&req);
    match state.store.get(ticket_id).await {
        Ok(Some(ticket)) => payload_response(format, &ticket.to_dto()),
        Ok(None) => not_found_response("no such ticket"),
        Err(e) => {
            error!("Ticket lookup failed: {}", e);
            internal_error_response("ticket lookup failed")
        }
    }
}

/// Optional ticket reference in the WebSocket query string.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WsQuery {
    ticket: Option<String>,
}

/// Handle the mentee WebSocket (GET /ws/mentee, GET /ws/mentee/{ticket})
///
/// The ticket is resolved (or created) before the upgrade so failures can
/// still answer with a plain status code.
pub async fn handle_mentee_ws(
    state: Arc<AppState>,
    req: Request<Incoming>,
    path_ticket: Option<String>,
) -> Response<Full<Bytes>> {
    if !hyper_tungstenite::is_upgrade_request(&req) {
        return bad_request_response("WebSocket upgrade required");
    }

    let format = accept_format(&req);
    let query = req.uri().query().unwrap_or("").to_string();

    let attach_id = match path_ticket {
        Some(id) => Some(id),
        None => serde_urlencoded::from_str::<WsQuery>(&query)
            .ok()
            .and_then(|q| q.ticket),
    };

    let ticket: Ticket = match attach_id {
        Some(id) => match state.store.get(&id).await {
            Ok(Some(ticket)) => ticket,
            Ok(None) => return not_found_response("no such ticket"),
            Err(e) => {
                error!("Ticket lookup failed: {}", e);
                return internal_error_response("ticket lookup failed");
            }
        },
        None => {
            let args: TicketCreate = match serde_urlencoded::from_str(&query) {
                Ok(args) => args,
                Err(e) => return bad_request_response(&format!("Invalid query: {}", e)),
            };
            if args.user_id.is_empty() {
                return bad_request_response("userId is required");
            }
            match state.store.create(args).await {
                Ok(Some(ticket)) => ticket,
                Ok(None) => return not_found_response("unknown user"),
                Err(e) => {
                    error!("Ticket creation failed: {}", e);
                    return internal_error_response("ticket creation failed");
                }
            }
        }
    };

    let (response, websocket) = match hyper_tungstenite::upgrade(req, None) {
        Ok((response, websocket)) => (response, websocket),
        Err(e) => {
            error!("WebSocket upgrade failed: {}", e);
            return internal_error_response("WebSocket upgrade failed");
        }
    };

    tokio::spawn(async move {
        match websocket.await {
            Ok(ws) => {
                if let Err(e) = run_mentee_session(ws, ticket, format, state).await {
                    warn!("Mentee session error: {}", e);
                }
            }
            Err(e) => {
                error!("WebSocket handshake failed: {}", e);
            }
        }
    });

    let (parts, _body) = response.into_parts();
    Response::from_parts(parts, Full::new(Bytes::new()))
}
