//! Mentor-facing endpoints.
//!
//! Mentors authenticate with the opaque access token issued at
//! authorization time; the token rides in the path. Authorization itself
//! is an admin operation guarded by the shared admin secret.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{header, Request, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::mentors::Mentor;
use crate::routes::{
    bad_request_response, forbidden_response, internal_error_response, not_found_response,
    payload_response, unauthorized_response,
};
use crate::server::AppState;
use crate::session::run_mentor_session;
use crate::ticket::PayloadFormat;

fn accept_format(req: &Request<Incoming>) -> PayloadFormat {
    PayloadFormat::from_accept(
        req.headers()
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok()),
    )
}

/// Resolve the mentor behind an access token, or answer for the failure.
async fn authenticate(
    state: &AppState,
    token: &str,
) -> Result<Mentor, Response<Full<Bytes>>> {
    match state.mentors.get_by_token(token).await {
        Ok(Some(mentor)) => Ok(mentor),
        Ok(None) => Err(unauthorized_response()),
        Err(e) => {
            error!("Mentor token lookup failed: {}", e);
            Err(internal_error_response("mentor lookup failed"))
        }
    }
}

/// Handle the mentor WebSocket (GET /ws/mentor/{token})
pub async fn handle_mentor_ws(
    state: Arc<AppState>,
    req: Request<Incoming>,
    token: &str,
) -> Response<Full<Bytes>> {
    if !hyper_tungstenite::is_upgrade_request(&req) {
        return bad_request_response("WebSocket upgrade required");
    }

    // Authenticate before upgrading so a bad token gets a 401, not a
    // socket that closes immediately.
    let mentor = match authenticate(&state, token).await {
        Ok(mentor) => mentor,
        Err(response) => return response,
    };
    let format = accept_format(&req);

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
                if let Err(e) = run_mentor_session(ws, mentor, format, state).await {
                    warn!("Mentor session error: {}", e);
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

/// Handle the mentor roster (GET /mentor)
///
/// Revoked mentors stay listed; access tokens are never included.
pub async fn handle_mentor_roster(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let format = accept_format(&req);
    match state.mentors.roster().await {
        Ok(mentors) => {
            let dtos: Vec<_> = mentors.iter().map(Mentor::to_dto).collect();
            payload_response(format, &dtos)
        }
        Err(e) => {
            error!("Mentor roster failed: {}", e);
            internal_error_response("mentor roster failed")
        }
    }
}

/// Handle mentor self-lookup (GET /mentor/{token})
pub async fn handle_mentor_self(
    state: Arc<AppState>,
    req: Request<Incoming>,
    token: &str,
) -> Response<Full<Bytes>> {
    let format = accept_format(&req);
    match state.mentors.get_by_token(token).await {
        Ok(Some(mentor)) => payload_response(format, &mentor.to_dto()),
        Ok(None) => not_found_response("unknown token"),
        Err(e) => {
            error!("Mentor token lookup failed: {}", e);
            internal_error_response("mentor lookup failed")
        }
    }
}

/// Handle a mentor's claimed queue (GET /mentor/{token}/tickets)
///
/// Open tickets currently claimed by this mentor, oldest first.
pub async fn handle_mentor_tickets(
    state: Arc<AppState>,
    req: Request<Incoming>,
    token: &str,
) -> Response<Full<Bytes>> {
    let format = accept_format(&req);
    let mentor = match authenticate(&state, token).await {
        Ok(mentor) => mentor,
        Err(response) => return response,
    };

    match state.store.open_tickets().await {
        Ok(tickets) => {
            let dtos: Vec<_> = tickets
                .iter()
                .filter(|ticket| {
                    ticket
                        .mentor
                        .as_ref()
                        .is_some_and(|m| m.id == mentor.user_id)
                })
                .map(|ticket| ticket.to_mentor_dto())
                .collect();
            payload_response(format, &dtos)
        }
        Err(e) => {
            error!("Open ticket listing failed: {}", e);
            internal_error_response("ticket listing failed")
        }
    }
}

// =============================================================================
// Admin: authorize / unauthorize
// =============================================================================

/// Admin request naming the directory user to act on.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AdminTarget {
    user_id: String,
}

fn admin_authorized(state: &AppState, req: &Request<Incoming>) -> bool {
    let Some(expected) = state.args.admin_secret.as_deref() else {
        // No secret configured means the admin surface is closed.
        return false;
    };
    req.headers()
        .get("x-admin-secret")
        .and_then(|v| v.to_str().ok())
        == Some(expected)
}

/// Target user id from the query string or the request body.
async fn admin_target(req: Request<Incoming>) -> Result<AdminTarget, Response<Full<Bytes>>> {
    let content = PayloadFormat::from_accept(
        req.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    );
    let query = req.uri().query().unwrap_or("").to_string();

    let target: AdminTarget = if !query.is_empty() {
        serde_urlencoded::from_str(&query)
            .map_err(|e| bad_request_response(&format!("Invalid query: {}", e)))?
    } else {
        let bytes = req
            .collect()
            .await
            .map_err(|e| bad_request_response(&format!("Failed to read body: {}", e)))?
            .to_bytes();
        content
            .decode(&String::from_utf8_lossy(&bytes))
            .map_err(|e| bad_request_response(&e.to_string()))?
    };

    if target.user_id.is_empty() {
        return Err(bad_request_response("userId is required"));
    }
    Ok(target)
}

/// Handle mentor authorization (POST /mentor/authorize)
///
/// This response is the only place an access token ever appears.
pub async fn handle_authorize_mentor(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    if !admin_authorized(&state, &req) {
        return forbidden_response();
    }

    let format = accept_format(&req);
    let target = match admin_target(req).await {
        Ok(target) => target,
        Err(response) => return response,
    };

    match state.mentors.authorize(&target.user_id).await {
        Ok(Some(mentor)) => {
            info!("Mentor {} authorized", mentor.user_id);
            payload_response(format, &mentor.to_authorized_dto())
        }
        Ok(None) => not_found_response("unknown user"),
        Err(e) => {
            error!("Mentor authorization failed: {}", e);
            internal_error_response("mentor authorization failed")
        }
    }
}

/// Handle mentor revocation (POST /mentor/unauthorize)
pub async fn handle_unauthorize_mentor(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    if !admin_authorized(&state, &req) {
        return forbidden_response();
    }

    let format = accept_format(&req);
    let target = match admin_target(req).await {
        Ok(target) => target,
        Err(response) => return response,
    };

    match state.mentors.unauthorize(&target.user_id).await {
        Ok(Some(mentor)) => {
            info!("Mentor {} unauthorized", mentor.user_id);
            payload_response(format, &mentor.to_dto())
        }
        Ok(None) => not_found_response("unknown mentor"),
        Err(e) => {
            error!("Mentor revocation failed: {}", e);
            internal_error_response("mentor revocation failed")
        }
    }
}
