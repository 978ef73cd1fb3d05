//! Error types for the IRC control connection.

use thiserror::Error;

use crate::failure::FailureKind;

/// Errors raised by the IRC session and its line codec.
#[derive(Debug, Error)]
pub enum IrcError {
    /// The TCP connection to the IRC server could not be established.
    #[error("cannot connect to {host}:{port}: {source}")]
    Connect {
        /// Server host name.
        host: String,
        /// Server port.
        port: u16,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Socket error on an established connection.
    #[error("IRC connection error: {0}")]
    Io(#[from] std::io::Error),

    /// A received line exceeded the codec's maximum length.
    #[error("IRC line too long ({actual} bytes, limit {limit})")]
    LineTooLong {
        /// Length of the offending line.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// A line could not be parsed as an IRC message.
    #[error("unparseable IRC line '{line}': {reason}")]
    Parse {
        /// The raw line.
        line: String,
        /// Why parsing failed.
        reason: &'static str,
    },

    /// The server refused our registration (nickname in use, banned, ...).
    #[error("registration rejected for nickname '{nickname}' ({code}): {reason}")]
    RegistrationRejected {
        /// Nickname we tried last.
        nickname: String,
        /// Numeric reply code or the command name.
        code: String,
        /// Server-provided reason text.
        reason: String,
    },

    /// The server refused to let us join the channel.
    #[error("cannot join {channel} ({code}): {reason}")]
    JoinRejected {
        /// Channel we tried to join.
        channel: String,
        /// Numeric reply code.
        code: String,
        /// Server-provided reason text.
        reason: String,
    },

    /// No expected reply arrived in time.
    #[error("timed out after {secs}s waiting for {stage}")]
    Timeout {
        /// What we were waiting for.
        stage: &'static str,
        /// Bound that elapsed, in seconds.
        secs: u64,
    },

    /// The server closed the connection.
    #[error("IRC connection closed by server")]
    ConnectionClosed,

    /// An operation was attempted in the wrong session state.
    #[error("IRC session is {actual}, expected {expected}")]
    InvalidState {
        /// State required by the operation.
        expected: &'static str,
        /// Actual state.
        actual: &'static str,
    },
}

impl IrcError {
    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Connect { .. } => FailureKind::Network,
            Self::RegistrationRejected { .. } | Self::JoinRejected { .. } => {
                FailureKind::RegistrationRejected
            }
            Self::Timeout { .. } => FailureKind::NoResponse,
            Self::Io(_) | Self::ConnectionClosed | Self::InvalidState { .. } => {
                FailureKind::SessionLost
            }
            Self::LineTooLong { .. } | Self::Parse { .. } => FailureKind::Protocol,
        }
    }
}
