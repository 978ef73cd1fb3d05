//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use subsplease_core::EpisodeSet;
use subsplease_core::orchestrator::MAX_CONCURRENCY;

/// Search fansub XDCC pack lists and download episodes over IRC DCC.
///
/// Without --download the matching packs are only listed.
#[derive(Parser, Debug)]
#[command(name = "subsplease-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Show title to search for
    pub title: String,

    /// Resolution to keep, e.g. 1080p
    #[arg(short, long)]
    pub resolution: Option<String>,

    /// Bot name (exact, or a substring when nothing matches exactly)
    #[arg(short, long)]
    pub bot: Option<String>,

    /// Releasing group
    #[arg(short, long)]
    pub group: Option<String>,

    /// Episodes to keep, e.g. 1,4,8-12 (default: all)
    #[arg(short, long, value_parser = EpisodeSet::parse, default_value = "")]
    pub episodes: EpisodeSet,

    /// Download the matches instead of listing them
    #[arg(short, long)]
    pub download: bool,

    /// Directory the episodes are written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Concurrent DCC transfers (1-3)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=MAX_CONCURRENCY as i64))]
    pub concurrency: Option<u8>,

    /// Title similarity cutoff (0.0-1.0)
    #[arg(long, value_parser = parse_cutoff)]
    pub cutoff: Option<f64>,

    /// Print matches as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

fn parse_cutoff(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|_| format!("'{raw}' is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside 0.0..=1.0"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_title_only_parses_with_defaults() {
        let args = Args::try_parse_from(["subsplease-dl", "no game no life"]).unwrap();
        assert_eq!(args.title, "no game no life");
        assert!(args.episodes.is_unrestricted());
        assert!(!args.download);
        assert!(args.concurrency.is_none());
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_cli_full_selection() {
        let args = Args::try_parse_from([
            "subsplease-dl",
            "no game no life",
            "-r",
            "1080p",
            "-b",
            "ARUTHA-BATCH|1080p",
            "-e",
            "1,4",
            "-d",
        ])
        .unwrap();
        assert_eq!(args.resolution.as_deref(), Some("1080p"));
        assert_eq!(args.bot.as_deref(), Some("ARUTHA-BATCH|1080p"));
        assert_eq!(args.episodes.iter().collect::<Vec<_>>(), vec![1, 4]);
        assert!(args.download);
    }

    #[test]
    fn test_cli_malformed_episodes_rejected() {
        let err = Args::try_parse_from(["subsplease-dl", "x", "-e", "5-3"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        let args = Args::try_parse_from(["subsplease-dl", "x", "-c", "3"]).unwrap();
        assert_eq!(args.concurrency, Some(3));

        let err = Args::try_parse_from(["subsplease-dl", "x", "-c", "4"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        let err = Args::try_parse_from(["subsplease-dl", "x", "-c", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_cutoff_range() {
        let args = Args::try_parse_from(["subsplease-dl", "x", "--cutoff", "0.8"]).unwrap();
        assert_eq!(args.cutoff, Some(0.8));
        assert!(Args::try_parse_from(["subsplease-dl", "x", "--cutoff", "1.5"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["subsplease-dl", "x", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_missing_title_rejected() {
        let err = Args::try_parse_from(["subsplease-dl"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["subsplease-dl", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
