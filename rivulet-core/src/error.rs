//! Streaming errors.

use thiserror::Error;

/// Errors that can occur while building, feeding or draining a stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The stream could not be set up (unknown format, invalid transport, missing host
    /// capability). Raised before any byte is sent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A payload could not be turned into JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport failed to encode a message.
    #[error("Failed to encode message: {0}")]
    Encode(String),

    /// The producer returned an error or panicked.
    #[error("Producer failed: {0}")]
    Producer(String),

    /// Write attempted after the stream was closed.
    #[error("Stream is closed")]
    Closed,

    /// The consumer side went away.
    #[error("Consumer disconnected")]
    Disconnected,

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl StreamError {
    /// Build a producer failure, keeping the whole error chain.
    pub fn from_producer(err: &anyhow::Error) -> Self {
        Self::Producer(format!("{err:#}"))
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StreamError::Disconnected;
        assert_eq!(err.to_string(), "Consumer disconnected");

        let err = StreamError::Configuration("unknown transport format: ws".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: unknown transport format: ws"
        );
    }

    #[test]
    fn test_from_producer_keeps_context() {
        let err = anyhow::anyhow!("disk full").context("writing snapshot");
        let err = StreamError::from_producer(&err);
        assert_eq!(err.to_string(), "Producer failed: writing snapshot: disk full");
    }
}
