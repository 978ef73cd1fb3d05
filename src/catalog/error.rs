//! Error types for the release catalog.

use std::path::PathBuf;

use thiserror::Error;

use crate::dcc::DccError;
use crate::failure::FailureKind;
use crate::xdcc::XdccError;

/// Errors raised while obtaining pack lists.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The HTTP pack list could not be fetched.
    #[error("could not fetch pack list of {bot} from {url}: {source}")]
    Http {
        /// Bot whose list was requested.
        bot: String,
        /// Configured list URL.
        url: String,
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The list cache could not be read or written.
    #[error("pack list cache error at {path}: {source}")]
    Cache {
        /// Cache file or directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The bot did not offer its list.
    #[error("pack list request to {bot} failed: {source}")]
    Request {
        /// Bot nickname.
        bot: String,
        /// What went wrong.
        #[source]
        source: XdccError,
    },

    /// The list transfer failed.
    #[error("pack list transfer from {bot} failed: {source}")]
    Transfer {
        /// Bot nickname.
        bot: String,
        /// What went wrong.
        #[source]
        source: DccError,
    },

    /// Not a single configured bot produced a list.
    #[error("no pack list could be obtained from {bots}")]
    Unavailable {
        /// Comma separated bot names.
        bots: String,
    },
}

impl CatalogError {
    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Http { .. } | Self::Unavailable { .. } => FailureKind::Network,
            Self::Cache { .. } => FailureKind::Io,
            Self::Request { source, .. } => source.kind(),
            Self::Transfer { source, .. } => source.kind(),
        }
    }
}
