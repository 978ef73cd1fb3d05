//! Error types for XDCC requests and DCC control messages.

use thiserror::Error;

use crate::failure::FailureKind;
use crate::irc::IrcError;

/// Errors raised while requesting a pack or parsing a bot's reply.
#[derive(Debug, Error)]
pub enum XdccError {
    /// A DCC control message could not be parsed.
    #[error("invalid DCC message '{payload}': {reason}")]
    InvalidDcc {
        /// The CTCP body as received.
        payload: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The bot offered something this client does not implement.
    #[error("unsupported offer from {bot}: {reason}")]
    UnsupportedOffer {
        /// Offering bot.
        bot: String,
        /// Why it cannot be accepted.
        reason: &'static str,
    },

    /// The bot explicitly refused the request.
    #[error("{bot} refused pack {pack}: {message}")]
    Denied {
        /// Bot nickname.
        bot: String,
        /// Requested pack.
        pack: String,
        /// The bot's notice text.
        message: String,
    },

    /// The bot did not answer within the bound.
    #[error("no response from {bot} for pack {pack} within {secs}s")]
    NoResponse {
        /// Bot nickname.
        bot: String,
        /// Requested pack.
        pack: String,
        /// Bound that elapsed.
        secs: u64,
    },

    /// The control connection failed underneath the request.
    #[error(transparent)]
    Session(#[from] IrcError),
}

impl XdccError {
    /// Creates an `InvalidDcc` error.
    pub fn invalid(payload: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidDcc {
            payload: payload.into(),
            reason,
        }
    }

    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidDcc { .. } => FailureKind::Protocol,
            Self::UnsupportedOffer { .. } | Self::Denied { .. } => FailureKind::PackUnavailable,
            Self::NoResponse { .. } => FailureKind::NoResponse,
            Self::Session(e) => e.kind(),
        }
    }
}
