//! Offer matcher: narrows catalog candidates to the packs to download.
//!
//! Candidates are filtered by resolution, group, bot and episode set,
//! deduplicated by `(network, bot, pack)` and ordered by episode. When an
//! episode is still offered more than once the selection is ambiguous and
//! no transfer requests are produced until the user narrows it.

mod error;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub use error::MatchError;

use crate::catalog::{ReleaseOffer, normalize_title};
use crate::episodes::EpisodeSet;
use crate::irc::{irc_eq, irc_to_lower};

/// User supplied narrowing criteria. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferFilter {
    /// Resolution label, compared case-insensitively.
    pub resolution: Option<String>,
    /// Bot name: exact (IRC case-insensitive) or, failing that, substring.
    pub bot: Option<String>,
    /// Releasing group, compared case-insensitively.
    pub group: Option<String>,
    /// Episodes to keep; empty keeps everything.
    pub episodes: EpisodeSet,
}

impl OfferFilter {
    /// A filter that keeps every candidate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the resolution.
    #[must_use]
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    /// Restricts the bot.
    #[must_use]
    pub fn with_bot(mut self, bot: impl Into<String>) -> Self {
        self.bot = Some(bot.into());
        self
    }

    /// Restricts the releasing group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Restricts the episodes.
    #[must_use]
    pub fn with_episodes(mut self, episodes: EpisodeSet) -> Self {
        self.episodes = episodes;
        self
    }
}

/// One episode offered by several packs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    /// Show title.
    pub title: String,
    /// Episode number or label.
    pub episode: String,
    /// Competing `(bot, pack)` pairs.
    pub offers: Vec<(String, u32)>,
}

impl Conflict {
    /// Distinct bot names involved, sorted.
    #[must_use]
    pub fn bots(&self) -> Vec<&str> {
        let names: BTreeSet<&str> = self.offers.iter().map(|(bot, _)| bot.as_str()).collect();
        names.into_iter().collect()
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offers: Vec<String> = self
            .offers
            .iter()
            .map(|(bot, pack)| format!("{bot} #{pack}"))
            .collect();
        write!(
            f,
            "'{}' episode {} is offered by {}",
            self.title,
            self.episode,
            offers.join(", ")
        )
    }
}

/// A pack selected for download and where to put it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    /// The selected offer.
    pub offer: ReleaseOffer,
    /// Destination file.
    pub destination: PathBuf,
}

/// Matching offers plus any ambiguity among them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet {
    /// Matches in download order.
    pub offers: Vec<ReleaseOffer>,
    /// Episodes offered more than once.
    pub conflicts: Vec<Conflict>,
}

impl MatchSet {
    /// True when at least one episode has competing offers.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// The [`MatchError::Ambiguous`] describing every conflict, if any.
    #[must_use]
    pub fn ambiguity(&self) -> Option<MatchError> {
        self.is_ambiguous().then(|| MatchError::Ambiguous {
            conflicts: self.conflicts.clone(),
        })
    }

    /// One request per match, destined for `output_dir`.
    ///
    /// # Errors
    ///
    /// [`MatchError::Ambiguous`] when any episode has competing offers.
    pub fn into_requests(self, output_dir: &Path) -> Result<Vec<TransferRequest>, MatchError> {
        if let Some(e) = self.ambiguity() {
            return Err(e);
        }
        Ok(self
            .offers
            .into_iter()
            .map(|offer| TransferRequest {
                destination: output_dir.join(sanitize_filename(&offer.filename)),
                offer,
            })
            .collect())
    }
}

/// Applies `filter` to `candidates`.
#[must_use]
pub fn match_offers(candidates: Vec<ReleaseOffer>, filter: &OfferFilter) -> MatchSet {
    let mut kept: Vec<ReleaseOffer> = candidates
        .into_iter()
        .filter(|offer| {
            filter
                .resolution
                .as_deref()
                .is_none_or(|r| offer.resolution.eq_ignore_ascii_case(r))
                && filter
                    .group
                    .as_deref()
                    .is_none_or(|g| offer.group.eq_ignore_ascii_case(g))
                && filter.episodes.admits(offer.episode)
        })
        .collect();

    if let Some(wanted) = filter.bot.as_deref() {
        if kept.iter().any(|offer| irc_eq(&offer.bot, wanted)) {
            kept.retain(|offer| irc_eq(&offer.bot, wanted));
        } else {
            let needle = irc_to_lower(wanted);
            kept.retain(|offer| irc_to_lower(&offer.bot).contains(&needle));
        }
    }

    let mut seen = HashSet::new();
    kept.retain(|offer| seen.insert((offer.network.clone(), offer.bot.clone(), offer.pack)));

    kept.sort_by(|a, b| {
        (a.episode.is_none(), a.episode, &a.title, &a.bot, a.pack).cmp(&(
            b.episode.is_none(),
            b.episode,
            &b.title,
            &b.bot,
            b.pack,
        ))
    });

    let conflicts = find_conflicts(&kept);
    MatchSet {
        offers: kept,
        conflicts,
    }
}

fn find_conflicts(offers: &[ReleaseOffer]) -> Vec<Conflict> {
    let mut groups: BTreeMap<(String, (bool, Option<u32>, String)), Vec<&ReleaseOffer>> =
        BTreeMap::new();
    for offer in offers {
        let episode_key = match offer.episode {
            Some(n) => (false, Some(n), String::new()),
            None => (true, None, offer.episode_label.clone().unwrap_or_default()),
        };
        groups
            .entry((normalize_title(&offer.title), episode_key))
            .or_default()
            .push(offer);
    }

    groups
        .into_values()
        .filter(|group| group.len() > 1)
        .map(|group| Conflict {
            title: group[0].title.clone(),
            episode: match (group[0].episode, &group[0].episode_label) {
                (Some(n), _) => n.to_string(),
                (None, Some(label)) => label.clone(),
                (None, None) => "(none)".to_string(),
            },
            offers: group.iter().map(|o| (o.bot.clone(), o.pack)).collect(),
        })
        .collect()
}

/// Replaces characters that are invalid in filenames on common filesystems
/// (`/ \ : * ? " < > |` and control characters).
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match sanitized.trim() {
        "" | "." | ".." => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}
