//! Rendering of matches and run results, and the exit code mapping.

use std::fmt::Write as _;

use subsplease_core::{FailureKind, ReleaseOffer, RequestOutcome, RunSummary};

/// Process exit outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Everything requested was done (or nothing needed doing).
    Success,
    /// Every transfer failed or the network was unreachable.
    Failure,
    /// The selection could not be resolved from the given input.
    Usage,
    /// Stopped by Ctrl-C.
    Interrupted,
}

impl ProcessExit {
    pub(crate) fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Usage => 2,
            Self::Interrupted => 130,
        }
    }
}

/// Exit outcome for a failure that ends the run before any transfer.
pub(crate) fn exit_for_kind(kind: FailureKind) -> ProcessExit {
    match kind {
        FailureKind::MalformedSpec | FailureKind::AmbiguousSelection => ProcessExit::Usage,
        _ => ProcessExit::Failure,
    }
}

/// Determines the exit outcome once every request reached a terminal state.
pub(crate) fn determine_exit_outcome(summary: &RunSummary) -> ProcessExit {
    if summary.all_failed() {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}

/// `[group] title - episode (resolution)  (#pack - bot)`
pub(crate) fn listing_line(offer: &ReleaseOffer) -> String {
    format!("{}  (#{} - {})", offer.display_name(), offer.pack, offer.bot)
}

pub(crate) fn render_listing(offers: &[ReleaseOffer]) -> String {
    let mut out = String::new();
    for offer in offers {
        let _ = writeln!(out, "{}", listing_line(offer));
    }
    out
}

pub(crate) fn render_json(offers: &[ReleaseOffer]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(offers)
}

/// One line per request, then a count line.
pub(crate) fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    for report in &summary.reports {
        let name = report.request.offer.display_name();
        match &report.outcome {
            RequestOutcome::Complete {
                path,
                already_present: true,
                ..
            } => {
                let _ = writeln!(out, "Complete {} (already downloaded)", path.display());
            }
            RequestOutcome::Complete {
                path,
                resumed_from: Some(offset),
                ..
            } => {
                let _ = writeln!(out, "Complete {} (resumed at byte {offset})", path.display());
            }
            RequestOutcome::Complete { path, .. } => {
                let _ = writeln!(out, "Complete {}", path.display());
            }
            RequestOutcome::Failed { kind, message } => {
                let _ = writeln!(out, "Failed   {name}: {kind}: {message}");
                let _ = writeln!(out, "         {}", kind.suggestion());
            }
        }
    }
    let _ = writeln!(
        out,
        "{} completed, {} failed",
        summary.completed(),
        summary.failed()
    );
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use subsplease_core::{RequestReport, TransferRequest};

    use super::*;

    fn offer() -> ReleaseOffer {
        ReleaseOffer::new("No Game No Life", Some("04"), "1080p", "ARUTHA-BATCH|1080p", 211)
    }

    fn report(outcome: RequestOutcome) -> RequestReport {
        RequestReport {
            request: TransferRequest {
                offer: offer(),
                destination: PathBuf::from("out/ep04.mkv"),
            },
            outcome,
        }
    }

    #[test]
    fn test_listing_line_format() {
        assert_eq!(
            listing_line(&offer()),
            "[SubsPlease] No Game No Life - 04 (1080p)  (#211 - ARUTHA-BATCH|1080p)"
        );
    }

    #[test]
    fn test_json_lists_offers() {
        let json = render_json(&[offer()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["pack"], 211);
        assert_eq!(value[0]["bot"], "ARUTHA-BATCH|1080p");
    }

    #[test]
    fn test_summary_shows_kind_and_suggestion() {
        let summary = RunSummary {
            reports: vec![
                report(RequestOutcome::Complete {
                    path: PathBuf::from("out/ep04.mkv"),
                    bytes: 10,
                    resumed_from: Some(4),
                    already_present: false,
                }),
                report(RequestOutcome::Failed {
                    kind: FailureKind::PackUnavailable,
                    message: "bot denied pack #211".to_string(),
                }),
            ],
        };
        let text = render_summary(&summary);
        assert!(text.contains("Complete out/ep04.mkv (resumed at byte 4)"));
        assert!(text.contains("PackUnavailable: bot denied pack #211"));
        assert!(text.contains(FailureKind::PackUnavailable.suggestion()));
        assert!(text.ends_with("1 completed, 1 failed\n"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_for_kind(FailureKind::AmbiguousSelection).code(), 2);
        assert_eq!(exit_for_kind(FailureKind::MalformedSpec).code(), 2);
        assert_eq!(exit_for_kind(FailureKind::Network).code(), 1);
        assert_eq!(ProcessExit::Interrupted.code(), 130);
    }

    #[test]
    fn test_exit_outcome_failure_only_when_all_failed() {
        let failed = report(RequestOutcome::Failed {
            kind: FailureKind::NoResponse,
            message: String::new(),
        });
        let complete = report(RequestOutcome::Complete {
            path: PathBuf::from("out/ep04.mkv"),
            bytes: 1,
            resumed_from: None,
            already_present: true,
        });
        let all_failed = RunSummary {
            reports: vec![failed.clone()],
        };
        let partial = RunSummary {
            reports: vec![failed, complete],
        };
        assert_eq!(determine_exit_outcome(&all_failed), ProcessExit::Failure);
        assert_eq!(determine_exit_outcome(&partial), ProcessExit::Success);
        assert_eq!(determine_exit_outcome(&RunSummary::default()), ProcessExit::Success);
    }
}
