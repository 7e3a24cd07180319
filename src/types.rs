//! Common error and result types for the helpline service.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelplineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Chat channel error: {0}")]
    Chat(String),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

pub type Result<T> = std::result::Result<T, HelplineError>;
