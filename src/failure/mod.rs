//! Failure classification shared by every stage of the pipeline.
//!
//! Each module owns a structured error type; [`FailureKind`] is the common
//! vocabulary the orchestrator and the CLI use to decide whether an item can
//! be retried and what to tell the user.

use std::fmt;

use serde::Serialize;

/// Coarse category of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// The episode specification could not be parsed.
    MalformedSpec,
    /// More than one offer matched the same episode.
    AmbiguousSelection,
    /// The IRC server refused our nickname or registration.
    RegistrationRejected,
    /// The bot denied the request or does not know the pack.
    PackUnavailable,
    /// No reply arrived within the configured bound.
    NoResponse,
    /// The peer closed the data connection before the announced size.
    TruncatedTransfer,
    /// No bytes arrived within the idle timeout.
    StalledTransfer,
    /// The IRC connection went away while requests were still queued.
    SessionLost,
    /// A peer or server could not be reached.
    Network,
    /// Local filesystem error.
    Io,
    /// A peer sent data we could not interpret.
    Protocol,
}

impl FailureKind {
    /// Stable label used in reports and JSON output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::MalformedSpec => "MalformedSpec",
            Self::AmbiguousSelection => "AmbiguousSelection",
            Self::RegistrationRejected => "RegistrationRejected",
            Self::PackUnavailable => "PackUnavailable",
            Self::NoResponse => "NoResponse",
            Self::TruncatedTransfer => "TruncatedTransfer",
            Self::StalledTransfer => "StalledTransfer",
            Self::SessionLost => "SessionLost",
            Self::Network => "Network",
            Self::Io => "Io",
            Self::Protocol => "Protocol",
        }
    }

    /// Whether re-running the tool has a reasonable chance of succeeding.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::NoResponse
                | Self::TruncatedTransfer
                | Self::StalledTransfer
                | Self::SessionLost
                | Self::Network
        )
    }

    /// Short actionable hint for the user.
    #[must_use]
    pub fn suggestion(self) -> &'static str {
        match self {
            Self::MalformedSpec => "Use comma separated numbers or ranges, e.g. 1,4,8-12.",
            Self::AmbiguousSelection => "Narrow the selection with --bot (or --group).",
            Self::RegistrationRejected => "Pick another nickname with the `nickname` config key.",
            Self::PackUnavailable => "The pack list may be stale; search again and retry.",
            Self::NoResponse => "The bot may be busy or offline; rerun later.",
            Self::TruncatedTransfer | Self::StalledTransfer => {
                "The partial file was kept; rerun to resume."
            }
            Self::SessionLost => "The IRC connection dropped; rerun to continue the queue.",
            Self::Network => "Check connectivity to the IRC network and rerun.",
            Self::Io => "Check the output directory is writable and has free space.",
            Self::Protocol => "Rerun with -v and inspect the bot's replies.",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
