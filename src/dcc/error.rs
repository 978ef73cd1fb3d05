//! Error types for the DCC transfer engine.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::failure::FailureKind;
use crate::xdcc::XdccError;

/// Errors that end a DCC transfer attempt.
#[derive(Debug, Error)]
pub enum DccError {
    /// The peer's data port could not be reached.
    #[error("could not connect to DCC peer {address}: {source}")]
    Connect {
        /// Peer address from the offer.
        address: SocketAddr,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// Local file error.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the connection early. The partial file is kept.
    #[error("transfer of {path} truncated at {received} of {expected} bytes")]
    Truncated {
        /// Destination path.
        path: PathBuf,
        /// Bytes on disk.
        received: u64,
        /// Announced size.
        expected: u64,
    },

    /// Nothing arrived within the idle bound. The partial file is kept.
    #[error("transfer of {path} stalled at {received} of {expected} bytes (idle {idle_secs}s)")]
    Stalled {
        /// Destination path.
        path: PathBuf,
        /// Bytes on disk.
        received: u64,
        /// Announced size.
        expected: u64,
        /// Idle bound that elapsed.
        idle_secs: u64,
    },

    /// The resume exchange failed on the control connection.
    #[error(transparent)]
    Negotiation(#[from] XdccError),
}

impl DccError {
    /// Creates an IO error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Connect { .. } => FailureKind::Network,
            Self::Io { .. } => FailureKind::Io,
            Self::Truncated { .. } => FailureKind::TruncatedTransfer,
            Self::Stalled { .. } => FailureKind::StalledTransfer,
            Self::Negotiation(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_message_carries_counts() {
        let err = DccError::Truncated {
            path: PathBuf::from("/tmp/ep.mkv"),
            received: 10,
            expected: 20,
        };
        assert_eq!(err.to_string(), "transfer of /tmp/ep.mkv truncated at 10 of 20 bytes");
        assert_eq!(err.kind(), FailureKind::TruncatedTransfer);
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn test_io_error_kind() {
        let err = DccError::io("/x", std::io::Error::other("disk full"));
        assert_eq!(err.kind(), FailureKind::Io);
    }
}
