//! Runs transfer requests: one IRC session per network and channel, pack
//! requests serialized on it, DCC transfers in a small bounded pool.
//!
//! A failed request never stops the queue. Only an unreachable network
//! aborts the run.

mod error;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, info, instrument, warn};

pub use error::OrchestratorError;

use crate::dcc::{
    DEFAULT_RESUME_TIMEOUT, DccError, NoopObserver, PreparedTransfer, TransferLimits,
    TransferObserver, TransferReport, prepare,
};
use crate::failure::FailureKind;
use crate::irc::{IrcError, IrcSession, NetworkTarget, SessionConnector};
use crate::matcher::TransferRequest;
use crate::xdcc::{cancel_request, request_pack};

/// Largest supported number of concurrent DCC transfers.
pub const MAX_CONCURRENCY: usize = 3;

/// Default bound for a bot to answer a pack request.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(180);

/// Timeouts and pool size for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Concurrent DCC transfers, clamped to `1..=MAX_CONCURRENCY`.
    pub concurrency: usize,
    /// Bound for the bot's offer.
    pub reply_timeout: Duration,
    /// Bound for the bot's `DCC ACCEPT`.
    pub resume_timeout: Duration,
    /// Data connection bounds.
    pub limits: TransferLimits,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            resume_timeout: DEFAULT_RESUME_TIMEOUT,
            limits: TransferLimits::default(),
        }
    }
}

/// Terminal state of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RequestOutcome {
    /// The file is complete on disk.
    Complete {
        /// Final path.
        path: PathBuf,
        /// File size.
        bytes: u64,
        /// Offset a resumed transfer continued from.
        resumed_from: Option<u64>,
        /// Nothing was transferred because the file was already complete.
        already_present: bool,
    },
    /// The request failed.
    Failed {
        /// Failure category.
        kind: FailureKind,
        /// Detailed message with the offending identifiers.
        message: String,
    },
}

impl RequestOutcome {
    fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
        }
    }

    /// True for [`RequestOutcome::Complete`].
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

impl From<TransferReport> for RequestOutcome {
    fn from(report: TransferReport) -> Self {
        Self::Complete {
            path: report.path,
            bytes: report.bytes,
            resumed_from: report.resumed_from,
            already_present: report.already_present,
        }
    }
}

impl From<DccError> for RequestOutcome {
    fn from(error: DccError) -> Self {
        Self::failed(error.kind(), error.to_string())
    }
}

/// A request and how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestReport {
    /// The request as given.
    pub request: TransferRequest,
    /// Its terminal state.
    pub outcome: RequestOutcome,
}

/// Per-request results in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// One entry per request.
    pub reports: Vec<RequestReport>,
}

impl RunSummary {
    /// Number of completed requests.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_complete()).count()
    }

    /// Number of failed requests.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports.len() - self.completed()
    }

    /// True when there was at least one request and none completed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.reports.is_empty() && self.completed() == 0
    }
}

enum SessionSlot {
    Active(IrcSession),
    Failed { kind: FailureKind, message: String },
}

/// Drives transfer requests through IRC sessions and the DCC engine.
pub struct Orchestrator {
    connector: Arc<dyn SessionConnector>,
    observer: Arc<dyn TransferObserver>,
    settings: RunSettings,
}

impl Orchestrator {
    /// Creates an orchestrator opening sessions through `connector`.
    pub fn new(connector: Arc<dyn SessionConnector>, settings: RunSettings) -> Self {
        Self {
            connector,
            observer: Arc::new(NoopObserver),
            settings,
        }
    }

    /// Reports transfer progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Processes `requests` in order and reports every outcome.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Connect`] when a network cannot be reached at all.
    /// Every other failure is reported per request.
    #[instrument(
        skip_all,
        fields(requests = requests.len(), concurrency = self.settings.concurrency)
    )]
    pub async fn run(
        &self,
        requests: Vec<TransferRequest>,
    ) -> Result<RunSummary, OrchestratorError> {
        let concurrency = self.settings.concurrency.clamp(1, MAX_CONCURRENCY);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut transfers: JoinSet<Result<TransferReport, DccError>> = JoinSet::new();
        let mut running: HashMap<Id, usize> = HashMap::new();
        let mut outcomes: Vec<Option<RequestOutcome>> = vec![None; requests.len()];
        let mut sessions: HashMap<NetworkTarget, SessionSlot> = HashMap::new();

        let mut last_for_target: HashMap<&NetworkTarget, usize> = HashMap::new();
        for (index, request) in requests.iter().enumerate() {
            last_for_target.insert(&request.offer.network, index);
        }

        for (index, request) in requests.iter().enumerate() {
            let target = &request.offer.network;
            if !sessions.contains_key(target) {
                let slot = match self.connector.open(target).await {
                    Ok(session) => SessionSlot::Active(session),
                    Err(source @ IrcError::Connect { .. }) => {
                        transfers.abort_all();
                        close_all(&mut sessions).await;
                        return Err(OrchestratorError::Connect {
                            network: target.clone(),
                            source,
                        });
                    }
                    Err(e) => {
                        warn!(network = %target, error = %e, "could not open IRC session");
                        SessionSlot::Failed {
                            kind: e.kind(),
                            message: e.to_string(),
                        }
                    }
                };
                sessions.insert(target.clone(), slot);
            }

            let outcome = match sessions.get_mut(target) {
                Some(SessionSlot::Active(session)) if session.is_alive() => {
                    let permit = Arc::clone(&semaphore)
                        .acquire_owned()
                        .await
                        .map_err(|_| OrchestratorError::SemaphoreClosed)?;
                    match self.start_request(session, request).await {
                        Ok(PreparedTransfer::AlreadyComplete(report)) => Some(report.into()),
                        Ok(PreparedTransfer::Pending(pending)) => {
                            let observer = Arc::clone(&self.observer);
                            let limits = self.settings.limits;
                            let handle = transfers.spawn(async move {
                                let _permit = permit;
                                pending.run(observer, limits).await
                            });
                            running.insert(handle.id(), index);
                            None
                        }
                        Err(outcome) => Some(outcome),
                    }
                }
                Some(SessionSlot::Active(_)) => Some(RequestOutcome::failed(
                    FailureKind::SessionLost,
                    format!(
                        "IRC connection to {target} was lost before pack #{} of {} could be requested",
                        request.offer.pack, request.offer.bot
                    ),
                )),
                Some(SessionSlot::Failed { kind, message }) => {
                    Some(RequestOutcome::failed(*kind, message.clone()))
                }
                None => None,
            };
            if let Some(outcome) = outcome {
                log_outcome(request, &outcome);
                outcomes[index] = Some(outcome);
            }

            while let Some(joined) = transfers.try_join_next_with_id() {
                record(joined, &running, &requests, &mut outcomes);
            }

            if last_for_target.get(target) == Some(&index) {
                // Bots drop transfers when the requester quits, so finish first.
                while let Some(joined) = transfers.join_next_with_id().await {
                    record(joined, &running, &requests, &mut outcomes);
                }
                if let Some(SessionSlot::Active(mut session)) = sessions.remove(target) {
                    session.close().await;
                }
            }
        }

        while let Some(joined) = transfers.join_next_with_id().await {
            record(joined, &running, &requests, &mut outcomes);
        }
        close_all(&mut sessions).await;

        let reports = requests
            .into_iter()
            .zip(outcomes)
            .map(|(request, outcome)| RequestReport {
                request,
                outcome: outcome.unwrap_or_else(|| {
                    RequestOutcome::failed(FailureKind::Io, "transfer ended without a result")
                }),
            })
            .collect();
        Ok(RunSummary { reports })
    }

    /// Requests the pack and settles the start offset, on the session.
    async fn start_request(
        &self,
        session: &mut IrcSession,
        request: &TransferRequest,
    ) -> Result<PreparedTransfer, RequestOutcome> {
        let offer = &request.offer;
        info!(bot = %offer.bot, pack = offer.pack, name = %offer.display_name(), "requesting pack");

        let timeout = self.settings.reply_timeout;
        let reply = request_pack(session, &offer.bot, offer.pack, timeout).await;
        let dcc_offer = match reply {
            Ok(dcc_offer) => dcc_offer,
            Err(e) => {
                if e.kind() == FailureKind::NoResponse
                    && let Err(cancel_error) = cancel_request(session, &offer.bot)
                {
                    debug!(error = %cancel_error, "could not cancel timed out request");
                }
                return Err(RequestOutcome::failed(e.kind(), e.to_string()));
            }
        };
        if dcc_offer.size != offer.size_bytes && offer.size_bytes > 0 {
            debug!(
                announced = dcc_offer.size,
                listed = offer.size_bytes,
                "offer size differs from pack list"
            );
        }

        let prepared = prepare(
            session,
            &offer.bot,
            dcc_offer,
            &request.destination,
            self.settings.resume_timeout,
        )
        .await
        .map_err(RequestOutcome::from)?;

        // The unused offer still holds a transfer slot on the bot.
        if matches!(prepared, PreparedTransfer::AlreadyComplete(_))
            && let Err(e) = cancel_request(session, &offer.bot)
        {
            debug!(error = %e, "could not withdraw offer for complete file");
        }
        Ok(prepared)
    }
}

fn record(
    joined: Result<(Id, Result<TransferReport, DccError>), tokio::task::JoinError>,
    running: &HashMap<Id, usize>,
    requests: &[TransferRequest],
    outcomes: &mut [Option<RequestOutcome>],
) {
    let (id, outcome) = match joined {
        Ok((id, result)) => (id, result.map_or_else(RequestOutcome::from, RequestOutcome::from)),
        Err(e) => (
            e.id(),
            RequestOutcome::failed(FailureKind::Io, format!("transfer task failed: {e}")),
        ),
    };
    let Some(&index) = running.get(&id) else {
        warn!(task = %id, "finished transfer has no request");
        return;
    };
    log_outcome(&requests[index], &outcome);
    outcomes[index] = Some(outcome);
}

fn log_outcome(request: &TransferRequest, outcome: &RequestOutcome) {
    match outcome {
        RequestOutcome::Complete { path, bytes, .. } => {
            info!(
                pack = request.offer.pack,
                bot = %request.offer.bot,
                path = %path.display(),
                bytes,
                "request complete"
            );
        }
        RequestOutcome::Failed { kind, message } => {
            warn!(
                pack = request.offer.pack,
                bot = %request.offer.bot,
                %kind,
                %message,
                "request failed"
            );
        }
    }
}

async fn close_all(sessions: &mut HashMap<NetworkTarget, SessionSlot>) {
    for (_, slot) in sessions.drain() {
        if let SessionSlot::Active(mut session) = slot {
            session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ReleaseOffer;

    fn report(outcome: RequestOutcome) -> RequestReport {
        RequestReport {
            request: TransferRequest {
                offer: ReleaseOffer::new("Show", Some("01"), "1080p", "bot", 1),
                destination: PathBuf::from("/tmp/show.mkv"),
            },
            outcome,
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary {
            reports: vec![
                report(RequestOutcome::failed(FailureKind::NoResponse, "late")),
                report(RequestOutcome::Complete {
                    path: PathBuf::from("/tmp/show.mkv"),
                    bytes: 3,
                    resumed_from: None,
                    already_present: false,
                }),
            ],
        };
        assert_eq!(summary.completed(), 1);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.all_failed());
        assert!(!RunSummary::default().all_failed());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = RequestOutcome::failed(FailureKind::PackUnavailable, "denied");
        let json = serde_json::to_value(&outcome).unwrap_or_default();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "PackUnavailable");
    }

    #[test]
    fn test_settings_default_to_one_transfer() {
        let settings = RunSettings::default();
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.reply_timeout, DEFAULT_REPLY_TIMEOUT);
    }
}
