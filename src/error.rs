//! Error types for pathtrack
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using PathTrackError
pub type Result<T> = std::result::Result<T, PathTrackError>;

/// Unified error type for pathtrack operations
#[derive(Debug, Error)]
pub enum PathTrackError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Protocol(String),

    #[error("invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Failed to bind socket {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not connect to socket {}: {source}", path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Client-observed Errors
    // -------------------------------------------------------------------------
    /// The server answered with an `error:` line; holds the full line.
    #[error("{0}")]
    ServerError(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Server closed connection unexpectedly")]
    ConnectionClosed,

    // -------------------------------------------------------------------------
    // Shutdown Errors
    // -------------------------------------------------------------------------
    #[error("Failed to unlink socket {}: {source}", path.display())]
    Shutdown {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
