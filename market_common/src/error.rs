//! Error types shared between the relay and the console watcher.
//!
//! The `RelayError` enum unifies common failure cases for I/O, serialization,
//! websocket transport, and internal logic, allowing
//! crates to propagate a single error type.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by the relay and the watcher.
#[derive(Error, Debug)]
pub enum RelayError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Error while parsing a symbols file into `Symbol` values.
    #[error("Parse symbols file error: {0}")]
    ParseSymbolsFile(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Websocket framing or connection failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tungstenite::Error>),

    /// The websocket or Socket.IO handshake did not complete.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The configured upstream URL could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A peer sent something the Engine.IO / Socket.IO codec does not accept.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl From<tungstenite::Error> for RelayError {
    fn from(err: tungstenite::Error) -> Self {
        RelayError::WebSocket(Box::new(err))
    }
}

impl<T> From<PoisonError<T>> for RelayError {
    fn from(err: PoisonError<T>) -> Self {
        RelayError::MutexLock(err.to_string())
    }
}
