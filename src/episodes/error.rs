//! Error types for episode specification parsing.

use thiserror::Error;

use crate::failure::FailureKind;

/// Largest number of episodes a single range may expand to.
pub const MAX_RANGE_SPAN: u32 = 10_000;

/// Errors that can occur while parsing an episode specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EpisodeError {
    /// A token is neither a number nor an `a-b` range.
    #[error("malformed episode spec '{token}': {reason}")]
    Malformed {
        /// The offending comma-separated token.
        token: String,
        /// Why the token was rejected.
        reason: String,
    },

    /// A range whose lower bound exceeds its upper bound.
    #[error("malformed episode spec '{token}': range start {start} is greater than end {end}")]
    ReversedRange {
        /// The offending token.
        token: String,
        /// Lower bound as written.
        start: u32,
        /// Upper bound as written.
        end: u32,
    },

    /// A range that would expand to an unreasonable number of episodes.
    #[error("malformed episode spec '{token}': range covers more than {MAX_RANGE_SPAN} episodes")]
    RangeTooLarge {
        /// The offending token.
        token: String,
    },
}

impl EpisodeError {
    /// Creates a `Malformed` error for a token.
    #[must_use]
    pub fn malformed(token: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    /// All episode errors are user input errors.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        FailureKind::MalformedSpec
    }
}
