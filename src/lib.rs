//! Core library for subsplease-dl.
//!
//! Finds fansub releases in XDCC bots' pack lists and downloads them over
//! IRC DCC.
//!
//! # Architecture
//!
//! The library is organized into the following modules, leaf first:
//! - [`episodes`] - Episode specification parsing (`1,4,8-12`)
//! - [`catalog`] - Pack list fetching, parsing and title search
//! - [`matcher`] - Narrowing candidate offers into transfer requests
//! - [`irc`] - IRC line codec, message model and session state machine
//! - [`xdcc`] - CTCP/DCC control messages and pack requests
//! - [`dcc`] - DCC receive engine with resume support
//! - [`orchestrator`] - Runs requests over shared sessions
//! - [`failure`] - Failure taxonomy shared by every error type

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod dcc;
pub mod episodes;
pub mod failure;
pub mod irc;
pub mod matcher;
pub mod orchestrator;
pub mod xdcc;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogError, PackListCatalog, ReleaseOffer, StaticCatalog};
pub use dcc::{DccError, TransferLimits, TransferObserver, TransferReport};
pub use episodes::{EpisodeError, EpisodeSet};
pub use failure::FailureKind;
pub use irc::{IrcError, IrcSession, NetworkTarget, SessionConfig, SessionConnector, TcpConnector};
pub use matcher::{MatchError, MatchSet, OfferFilter, TransferRequest, match_offers};
pub use orchestrator::{
    Orchestrator, OrchestratorError, RequestOutcome, RequestReport, RunSettings, RunSummary,
};
pub use xdcc::{DccOffer, XdccError};
