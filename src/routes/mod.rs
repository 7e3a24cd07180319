//! HTTP routes for the helpline gateway.

pub mod health;
pub mod mentee;
pub mod mentor;

pub use health::{health_check, version_info};
pub use mentee::{handle_create_ticket, handle_get_ticket, handle_mentee_ws};
pub use mentor::{
    handle_authorize_mentor, handle_mentor_roster, handle_mentor_self, handle_mentor_tickets,
    handle_mentor_ws, handle_unauthorize_mentor,
};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::ticket::PayloadFormat;

// =============================================================================
// Response Helpers
// =============================================================================

pub(crate) fn json_response(
    status: StatusCode,
    body: &serde_json::Value,
) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Encode a payload in the client's negotiated format.
pub(crate) fn payload_response<T: Serialize>(
    format: PayloadFormat,
    body: &T,
) -> Response<Full<Bytes>> {
    match format.encode(body) {
        Ok(encoded) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", format.content_type())
            .header("Access-Control-Allow-Origin", "*")
            .body(Full::new(Bytes::from(encoded)))
            .unwrap(),
        Err(e) => internal_error_response(&e.to_string()),
    }
}

pub(crate) fn not_found_response(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "error": "Not Found",
            "message": message
        }),
    )
}

pub(crate) fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::BAD_REQUEST,
        &serde_json::json!({
            "error": "Bad Request",
            "message": message
        }),
    )
}

pub(crate) fn unauthorized_response() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::UNAUTHORIZED,
        &serde_json::json!({ "error": "Unauthorized" }),
    )
}

pub(crate) fn forbidden_response() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::FORBIDDEN,
        &serde_json::json!({ "error": "Forbidden" }),
    )
}

pub(crate) fn internal_error_response(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &serde_json::json!({
            "error": "Internal Server Error",
            "message": message
        }),
    )
}

/// CORS preflight response
pub(crate) fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}
