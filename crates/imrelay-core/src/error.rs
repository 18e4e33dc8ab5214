//! Error types for the relay core.

use thiserror::Error;

/// Relay errors.
///
/// None of these reach the transport layer. The router and the lifecycle
/// surface turn them into log lines and report variants.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Inbound text was empty or whitespace only
    #[error("Empty message")]
    EmptyMessage,

    /// Inbound text is not a JSON object envelope
    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    /// Outbound queue of the connection is full
    #[error("Outbound channel full")]
    ChannelFull,

    /// Transport side of the connection is gone
    #[error("Outbound channel closed")]
    ChannelClosed,
}

/// Result type alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
