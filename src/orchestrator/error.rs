//! Run-level errors of the orchestrator.

use thiserror::Error;

use crate::failure::FailureKind;
use crate::irc::{IrcError, NetworkTarget};

/// Errors that abort the whole run rather than a single request.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The IRC network could not be reached at all.
    #[error("cannot reach IRC network {network}: {source}")]
    Connect {
        /// Network the requests were destined for.
        network: NetworkTarget,
        /// The connection error.
        #[source]
        source: IrcError,
    },

    /// The transfer pool's semaphore was closed unexpectedly.
    #[error("transfer pool closed unexpectedly")]
    SemaphoreClosed,
}

impl OrchestratorError {
    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Connect { .. } => FailureKind::Network,
            Self::SemaphoreClosed => FailureKind::Io,
        }
    }
}
