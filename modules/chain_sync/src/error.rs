use std::time::Duration;

use ogmios_common::wire::NormalizeError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Terminal error of a chain-sync session
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Could not connect to {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("Handshake with {endpoint} timed out after {timeout:?}")]
    HandshakeTimeout { endpoint: String, timeout: Duration },

    #[error("Transport failure: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("Protocol violation: {0}")]
    Protocol(#[from] NormalizeError),

    #[error("Callback failed: {0:#}")]
    Callback(anyhow::Error),

    #[error("Checkpoint store failed: {0:#}")]
    Persistence(anyhow::Error),

    #[error("Could not encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SyncError {
    /// Errors after which a last checkpoint save is still worth attempting
    pub fn allows_final_checkpoint(&self) -> bool {
        !matches!(self, SyncError::Persistence(_))
    }
}
