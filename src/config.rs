//! Configuration for Helpline
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Helpline - mentor ticket gateway
///
/// Mentees ask for help, mentors answer. Everything in between is a ticket.
#[derive(Parser, Debug, Clone)]
#[command(name = "helpline")]
#[command(about = "REST and WebSocket gateway for the mentor helpline ticket queue")]
pub struct Args {
    /// Unique node identifier for this service instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Ticket store backend
    /// mongo: documents with optimistic locking (default)
    /// channel: tickets rendered as structured chat messages
    #[arg(long, env = "STORE_BACKEND", value_enum, default_value = "mongo")]
    pub store_backend: StoreBackend,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "helpline")]
    pub mongodb_db: String,

    /// Base URL of the user directory API (required in production)
    /// (e.g., "https://directory.example.com")
    #[arg(long, env = "DIRECTORY_URL")]
    pub directory_url: Option<String>,

    /// Service account username for the directory API (optional)
    /// Anonymous lookups are used when credentials are not set
    #[arg(long, env = "DIRECTORY_USER")]
    pub directory_user: Option<String>,

    /// Service account password for the directory API (optional)
    #[arg(long, env = "DIRECTORY_PASS")]
    pub directory_pass: Option<String>,

    /// Refresh the directory session token this many seconds before it expires
    #[arg(long, env = "TOKEN_REFRESH_MARGIN_SECS", default_value = "180")]
    pub token_refresh_margin_secs: u64,

    /// Shared secret for mentor authorize/unauthorize endpoints
    /// When unset those endpoints always refuse
    #[arg(long, env = "ADMIN_SECRET")]
    pub admin_secret: Option<String>,

    /// JSON file seeding the in-memory mentor registry (channel backend / dev)
    #[arg(long, env = "MENTORS_FILE")]
    pub mentors_file: Option<PathBuf>,

    /// How long a mentee socket stays open after its ticket reaches a
    /// terminal state, in milliseconds
    #[arg(long, env = "DRAIN_DELAY_MS", default_value = "10000")]
    pub drain_delay_ms: u64,

    /// WebSocket keepalive ping interval in seconds
    #[arg(long, env = "PING_INTERVAL_SECS", default_value = "25")]
    pub ping_interval_secs: u64,

    /// How many recent chat messages to scan when recovering open tickets
    #[arg(long, env = "HISTORY_SCAN_LIMIT", default_value = "30")]
    pub history_scan_limit: usize,

    /// How long completed/canceled tickets are retained, in seconds
    #[arg(long, env = "TICKET_RETENTION_SECS", default_value = "604800")]
    pub ticket_retention_secs: u64,

    /// Reaction emote that claims a ticket (channel backend)
    #[arg(long, env = "CLAIM_EMOTE", default_value = "👌")]
    pub claim_emote: String,

    /// Reaction emote that completes a ticket (channel backend)
    #[arg(long, env = "COMPLETE_EMOTE", default_value = "✅")]
    pub complete_emote: String,

    /// Enable development mode (missing externals degrade to warnings)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Which persistence backend owns the ticket queue
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Channel,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Mongo => "mongo",
            StoreBackend::Channel => "channel",
        }
    }
}

impl Args {
    /// Drain window applied to mentee sockets after a terminal update
    pub fn drain_delay(&self) -> Duration {
        Duration::from_millis(self.drain_delay_ms)
    }

    /// Keepalive ping cadence for both session kinds
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Retention window for terminal tickets in the mongo backend
    pub fn ticket_retention(&self) -> Duration {
        Duration::from_secs(self.ticket_retention_secs)
    }

    /// Freshness margin for cached directory session tokens
    pub fn token_refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_refresh_margin_secs as i64)
    }

    /// Directory service account, only when both halves are configured
    pub fn directory_credentials(&self) -> Option<(String, String)> {
        match (&self.directory_user, &self.directory_pass) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.directory_url.is_none() {
            return Err("DIRECTORY_URL is required in production mode".to_string());
        }

        if self.ping_interval_secs == 0 {
            return Err("PING_INTERVAL_SECS must be at least 1".to_string());
        }

        if self.history_scan_limit == 0 {
            return Err("HISTORY_SCAN_LIMIT must be at least 1".to_string());
        }

        if self.claim_emote == self.complete_emote {
            return Err("CLAIM_EMOTE and COMPLETE_EMOTE must differ".to_string());
        }

        Ok(())
    }
}
