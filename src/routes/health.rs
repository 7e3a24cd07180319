//! Health check endpoints
//!
//! /health and /healthz answer 200 while the store and the user directory
//! both respond, 503 once either stops. /version returns build metadata
//! for deployment verification.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

/// Health response consumed by probes and the status page
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status
    pub healthy: bool,
    /// 'ok' or 'degraded'
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    /// Current timestamp
    pub timestamp: String,
    /// Operating mode
    pub mode: String,
    /// Node identifier
    pub node_id: String,
    /// Ticket store health
    pub store: StoreHealth,
    /// User directory health
    pub directory: DirectoryHealth,
}

/// Ticket store health details
#[derive(Serialize)]
pub struct StoreHealth {
    /// Which backend is serving tickets
    pub backend: &'static str,
    /// Whether the backend answers
    pub connected: bool,
}

/// User directory health details
#[derive(Serialize)]
pub struct DirectoryHealth {
    /// Whether the directory answers
    pub connected: bool,
}

/// Build health response with current state
async fn build_health_response(state: &AppState) -> HealthResponse {
    let args = &state.args;

    let store_connected = state.store.healthy().await;
    let directory_connected = state.directory.healthy().await;
    let healthy = store_connected && directory_connected;

    HealthResponse {
        healthy,
        status: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: args.node_id.to_string(),
        store: StoreHealth {
            backend: state.store.backend(),
            connected: store_connected,
        },
        directory: DirectoryHealth {
            connected: directory_connected,
        },
    }
}

/// Handle health probe (/health, /healthz)
pub async fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state).await;

    let status = if response.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":false,"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Git commit hash (full)
    pub commit_full: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "helpline",
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"version":"unknown","commit":"unknown"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes_probe_fields() {
        let response = HealthResponse {
            healthy: true,
            status: "ok",
            version: "0.1.0",
            uptime: 42,
            timestamp: "2026-03-01T12:00:00Z".to_string(),
            mode: "production".to_string(),
            node_id: "node-1".to_string(),
            store: StoreHealth {
                backend: "mongo",
                connected: true,
            },
            directory: DirectoryHealth { connected: true },
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"healthy\":true"));
        assert!(json.contains("\"backend\":\"mongo\""));
        assert!(json.contains("\"status\":\"ok\""));
    }

    #[test]
    fn version_response_serializes_build_fields() {
        let response = VersionResponse {
            version: "0.1.0",
            commit: "abc1234",
            commit_full: "abc1234def",
            build_time: "2026-03-01T12:00:00Z",
            service: "helpline",
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"commit\":\"abc1234\""));
        assert!(json.contains("\"service\":\"helpline\""));
    }
}
