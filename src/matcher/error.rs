//! Error types for offer matching.

use thiserror::Error;

use super::Conflict;
use crate::failure::FailureKind;

/// Errors raised when turning matches into transfer requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// More than one offer remained for at least one episode.
    #[error("ambiguous selection: {}", describe(.conflicts))]
    Ambiguous {
        /// Every episode with competing offers.
        conflicts: Vec<Conflict>,
    },
}

fn describe(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl MatchError {
    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Ambiguous { .. } => FailureKind::AmbiguousSelection,
        }
    }
}
