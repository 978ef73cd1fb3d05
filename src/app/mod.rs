//! Application runtime: resolves settings, searches, matches, downloads.

pub(crate) mod config;
mod progress;
pub(crate) mod report;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use subsplease_core::catalog::{BotSource, DEFAULT_CUTOFF};
use subsplease_core::dcc::NoopObserver;
use subsplease_core::irc::{DEFAULT_CHANNEL, DEFAULT_PORT, DEFAULT_SERVER, random_nickname};
use subsplease_core::{
    Catalog, NetworkTarget, OfferFilter, Orchestrator, PackListCatalog, RunSettings,
    SessionConfig, SessionConnector, TcpConnector, TransferObserver, match_offers,
};

use crate::cli::Args;
use config::FileConfig;
use progress::ProgressBars;
use report::ProcessExit;

/// Everything the run needs, merged from flags, config file and defaults.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) network: NetworkTarget,
    pub(crate) session: SessionConfig,
    pub(crate) bots: Vec<BotSource>,
    pub(crate) output_dir: PathBuf,
    pub(crate) cutoff: f64,
    pub(crate) run: RunSettings,
}

/// CLI flags override file values, which override defaults.
pub(crate) fn resolve_settings(args: &Args, file: &FileConfig) -> Settings {
    let network = NetworkTarget::new(
        file.server.clone().unwrap_or_else(|| DEFAULT_SERVER.to_string()),
        file.port.unwrap_or(DEFAULT_PORT),
        file.channel.clone().unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
    );

    let mut session =
        SessionConfig::with_nickname(file.nickname.clone().unwrap_or_else(random_nickname));
    if let Some(secs) = file.register_timeout_secs {
        session.register_timeout = Duration::from_secs(secs);
    }

    let mut run = RunSettings::default();
    if let Some(concurrency) = args.concurrency.or(file.concurrency) {
        run.concurrency = usize::from(concurrency);
    }
    if let Some(secs) = file.reply_timeout_secs {
        run.reply_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.resume_timeout_secs {
        run.resume_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.idle_timeout_secs {
        run.limits.idle_timeout = Duration::from_secs(secs);
    }

    Settings {
        network,
        session,
        bots: file.bot_sources(),
        output_dir: args
            .output_dir
            .clone()
            .or_else(|| file.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(".")),
        cutoff: args.cutoff.or(file.cutoff).unwrap_or(DEFAULT_CUTOFF),
        run,
    }
}

fn offer_filter(args: &Args) -> OfferFilter {
    let mut filter = OfferFilter::new().with_episodes(args.episodes.clone());
    if let Some(resolution) = &args.resolution {
        filter = filter.with_resolution(resolution);
    }
    if let Some(bot) = &args.bot {
        filter = filter.with_bot(bot);
    }
    if let Some(group) = &args.group {
        filter = filter.with_group(group);
    }
    filter
}

/// Runs one search, and the downloads when requested.
pub(crate) async fn run(args: Args) -> Result<ProcessExit> {
    let loaded = config::load_default_file_config()?;
    if loaded.loaded_from_file {
        debug!(path = ?loaded.path, "loaded config file");
    }
    let settings = resolve_settings(&args, &loaded.config);
    debug!(network = %settings.network, nickname = %settings.session.nickname, "settings resolved");

    let connector: Arc<dyn SessionConnector> =
        Arc::new(TcpConnector::new(settings.session.clone()));
    let catalog = PackListCatalog::new(
        settings.network.clone(),
        settings.bots.clone(),
        Arc::clone(&connector),
    )
    .with_cutoff(settings.cutoff)
    .with_timeouts(settings.run.reply_timeout, settings.run.limits);

    let candidates = match catalog.fetch_candidates(&args.title).await {
        Ok(candidates) => candidates,
        Err(e) => {
            eprintln!("error: {e}\n  {}", e.kind().suggestion());
            return Ok(report::exit_for_kind(e.kind()));
        }
    };

    let matches = match_offers(candidates, &offer_filter(&args));
    if args.json {
        println!(
            "{}",
            report::render_json(&matches.offers).context("Failed to serialize matches")?
        );
    } else {
        print!("{}", report::render_listing(&matches.offers));
    }

    // Listed either way, so the user can pick a narrowing filter.
    if let Some(e) = matches.ambiguity() {
        eprintln!("error: {e}\n  {}", e.kind().suggestion());
        return Ok(report::exit_for_kind(e.kind()));
    }

    if !args.download {
        if matches.offers.is_empty() {
            info!(title = %args.title, "no releases matched");
        }
        return Ok(ProcessExit::Success);
    }

    let requests = match matches.into_requests(&settings.output_dir) {
        Ok(requests) => requests,
        Err(e) => {
            eprintln!("error: {e}\n  {}", e.kind().suggestion());
            return Ok(report::exit_for_kind(e.kind()));
        }
    };
    if requests.is_empty() {
        info!(title = %args.title, "no releases matched, nothing to download");
        return Ok(ProcessExit::Success);
    }

    let observer: Arc<dyn TransferObserver> = if progress::should_show_bars(
        io::stderr().is_terminal(),
        args.quiet,
        progress::is_dumb_terminal(),
    ) {
        Arc::new(ProgressBars::new())
    } else {
        Arc::new(NoopObserver)
    };
    let orchestrator = Orchestrator::new(connector, settings.run).with_observer(observer);

    match orchestrator.run(requests).await {
        Ok(summary) => {
            print!("{}", report::render_summary(&summary));
            Ok(report::determine_exit_outcome(&summary))
        }
        Err(e) => {
            warn!(error = %e, "run aborted");
            eprintln!("error: {e}\n  {}", e.kind().suggestion());
            Ok(ProcessExit::Failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["subsplease-dl", "frieren"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_without_config() {
        let settings = resolve_settings(&args(&[]), &FileConfig::default());
        assert_eq!(settings.network, NetworkTarget::default());
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert_eq!(settings.run.concurrency, 1);
        assert!((settings.cutoff - DEFAULT_CUTOFF).abs() < f64::EPSILON);
        assert_eq!(settings.bots.len(), 5);
        assert_eq!(settings.session.nickname.len(), 9);
    }

    #[test]
    fn test_flags_override_file_values() {
        let file = FileConfig {
            concurrency: Some(2),
            output_dir: Some(PathBuf::from("/anime")),
            cutoff: Some(0.9),
            ..FileConfig::default()
        };
        let settings = resolve_settings(&args(&["-c", "3", "-o", "here"]), &file);
        assert_eq!(settings.run.concurrency, 3);
        assert_eq!(settings.output_dir, PathBuf::from("here"));
        assert!((settings.cutoff - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_file_values_reach_session_and_transfers() {
        let file = FileConfig {
            server: Some("irc.example.org".to_string()),
            port: Some(6697),
            nickname: Some("leecher".to_string()),
            register_timeout_secs: Some(5),
            idle_timeout_secs: Some(7),
            ..FileConfig::default()
        };
        let settings = resolve_settings(&args(&[]), &file);
        assert_eq!(settings.network.host, "irc.example.org");
        assert_eq!(settings.network.port, 6697);
        assert_eq!(settings.network.channel, DEFAULT_CHANNEL);
        assert_eq!(settings.session.nickname, "leecher");
        assert_eq!(settings.session.register_timeout, Duration::from_secs(5));
        assert_eq!(settings.run.limits.idle_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_filter_from_flags() {
        let filter = offer_filter(&args(&["-r", "1080p", "-b", "CR", "-e", "1-3"]));
        assert_eq!(filter.resolution.as_deref(), Some("1080p"));
        assert_eq!(filter.bot.as_deref(), Some("CR"));
        assert!(filter.group.is_none());
        assert_eq!(filter.episodes.len(), 3);
    }
}
