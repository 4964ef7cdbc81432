//! # Error Types
//!
//! Error handling for the query and master server clients.
//!
//! This module defines every failure the crate can report, from low-level
//! socket errors up to master server handshake rejections.
//!
//! ## Error Categories
//! - **Transport**: connect failures, socket errors, phase deadlines
//! - **Handshake**: the master server rejecting the CD key or client
//! - **Wire**: truncated buffers, oversized strings, bad frame lengths
//! - **Usage**: lifecycle and configuration mistakes made by the caller
//!
//! Every variant maps onto an [`ErrorKind`] so callers can branch on the
//! category without matching message text.
//!
//! ## Example Usage
//! ```rust
//! use utquery::error::{ErrorKind, ProtocolError};
//!
//! let err = ProtocolError::Rejected("MD5 mismatch".into());
//! assert_eq!(err.kind(), ErrorKind::ProtocolRejection);
//! assert!(err.to_string().contains("MD5 mismatch"));
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Master session phases, used in timeout and logging messages
    pub const PHASE_CONNECT: &str = "connect";
    pub const PHASE_CHALLENGE: &str = "challenge";
    pub const PHASE_CREDENTIALS: &str = "credentials";
    pub const PHASE_REVIEW: &str = "review";
    pub const PHASE_GLOBAL_HASH: &str = "global hash";
    pub const PHASE_APPROVAL: &str = "approval";
    pub const PHASE_QUERY: &str = "query";
    pub const PHASE_COUNT: &str = "result count";
    pub const PHASE_ENTRIES: &str = "server entries";

    /// Worker errors
    pub const ERR_WORKER_TERMINATED: &str = "worker task terminated without a result";
}

/// Coarse classification of a [`ProtocolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The TCP connection to the master server could not be established
    ConnectFailure,
    /// No response arrived within a phase deadline
    PhaseTimeout,
    /// The master server refused the handshake
    ProtocolRejection,
    /// A received record was undersized or garbled
    MalformedEntry,
    /// The master server listed zero servers
    EmptyResult,
    /// A local socket or runtime resource failed
    SocketError,
    /// The caller misused the API or supplied bad configuration
    Usage,
}

// ProtocolError is the primary error type for all query operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connect failed: {0}")]
    ConnectFailure(String),

    #[error("timed out waiting for {0}")]
    PhaseTimeout(&'static str),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("not verified: {0}")]
    NotVerified(String),

    #[error("malformed entry: {0}")]
    MalformedEntry(String),

    #[error("no servers")]
    EmptyResult,

    #[error("socket error: {0}")]
    SocketError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("buffer truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("string length {0} exceeds limit")]
    StringTooLong(i32),

    #[error("compact index does not fit in 32 bits")]
    CompactIndexOverflow,

    #[error("invalid frame length: {0}")]
    InvalidFrameLength(i64),

    #[error("a master server query is already running")]
    MasterBusy,

    #[error("no cdkey configured")]
    MissingCdKey,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::ConnectFailure(_) => ErrorKind::ConnectFailure,
            ProtocolError::PhaseTimeout(_) => ErrorKind::PhaseTimeout,
            ProtocolError::Rejected(_) | ProtocolError::NotVerified(_) => {
                ErrorKind::ProtocolRejection
            }
            ProtocolError::MalformedEntry(_)
            | ProtocolError::Truncated { .. }
            | ProtocolError::StringTooLong(_)
            | ProtocolError::CompactIndexOverflow
            | ProtocolError::InvalidFrameLength(_) => ErrorKind::MalformedEntry,
            ProtocolError::EmptyResult => ErrorKind::EmptyResult,
            ProtocolError::Io(_) | ProtocolError::SocketError(_) | ProtocolError::ConnectionClosed => {
                ErrorKind::SocketError
            }
            ProtocolError::MasterBusy
            | ProtocolError::MissingCdKey
            | ProtocolError::ConfigError(_) => ErrorKind::Usage,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_keeps_server_text() {
        let err = ProtocolError::Rejected("CD-Key in use".to_string());
        assert_eq!(err.to_string(), "rejected: CD-Key in use");
        assert_eq!(err.kind(), ErrorKind::ProtocolRejection);
    }

    #[test]
    fn test_wire_errors_classify_as_malformed() {
        assert_eq!(
            ProtocolError::Truncated {
                needed: 4,
                remaining: 1
            }
            .kind(),
            ErrorKind::MalformedEntry
        );
        assert_eq!(
            ProtocolError::StringTooLong(20_000).kind(),
            ErrorKind::MalformedEntry
        );
        assert_eq!(
            ProtocolError::InvalidFrameLength(-1).kind(),
            ErrorKind::MalformedEntry
        );
    }

    #[test]
    fn test_empty_result_message() {
        assert_eq!(ProtocolError::EmptyResult.to_string(), "no servers");
        assert_eq!(ProtocolError::EmptyResult.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn test_io_errors_are_socket_errors() {
        let err: ProtocolError = io::Error::new(io::ErrorKind::AddrInUse, "busy").into();
        assert_eq!(err.kind(), ErrorKind::SocketError);
    }
}
