//! Error types for the Redis client.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for Redis operations.
pub type RespResult<T> = Result<T, RespError>;

/// Errors that can occur while talking to Redis.
#[derive(Debug, Error)]
pub enum RespError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection closed by server")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: String },
}
