//! Bridge-specific error types.

use thiserror::Error;

/// Errors that can occur while bridging to the federation network.
#[derive(Debug, Error)]
pub enum BridgeError {
    // ── Preconditions ───────────────────────────────────────────────────────

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No federation mapping found for {0}")]
    MappingNotFound(String),

    #[error("{0} not found")]
    NotFound(String),

    // ── Remote communication ─────────────────────────────────────────────────

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Remote server returned {0}: {1}")]
    Remote(u16, String),

    #[error("Unexpected response from remote server: {0}")]
    RemoteProtocol(String),

    // ── Wiring ───────────────────────────────────────────────────────────────

    #[error("Protocol services are not available")]
    ServiceUnavailable,

    // ── Infrastructure ───────────────────────────────────────────────────────

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        BridgeError::Http(e.to_string())
    }
}
