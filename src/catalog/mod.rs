//! Release catalog: what can be downloaded, from which bot, as which pack.
//!
//! [`Catalog`] is the single capability the rest of the pipeline needs.
//! [`PackListCatalog`] implements it on top of the bots' XDCC pack lists;
//! [`StaticCatalog`] serves a fixed set of offers.

mod cache;
mod error;
mod packlist;
mod remote;
mod search;

use async_trait::async_trait;
use serde::Serialize;

pub use cache::{CACHE_MAX_AGE, CACHE_MIN_SIZE, ListCache};
pub use error::CatalogError;
pub use packlist::{episode_number, parse_pack_line, parse_pack_list};
pub use remote::{
    BotSource, DEFAULT_BOTS, DEFAULT_LIST_REPLY_TIMEOUT, PackListCatalog, default_bots,
};
pub use search::{
    DEFAULT_CUTOFF, MAX_TITLES, closest_titles, filter_by_title, normalize_title,
    title_similarity,
};

use crate::irc::NetworkTarget;

/// One pack offered by one bot.
///
/// Identity is `(network, bot, pack)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseOffer {
    /// Show title as announced.
    pub title: String,
    /// Episode number, when the label is a plain (optionally versioned) number.
    pub episode: Option<u32>,
    /// Episode label as announced (`04`, `12v2`, `01-12`).
    pub episode_label: Option<String>,
    /// Resolution label, e.g. `1080p`.
    pub resolution: String,
    /// Releasing group.
    pub group: String,
    /// Bot offering the pack.
    pub bot: String,
    /// Pack number on that bot.
    pub pack: u32,
    /// Announced filename.
    pub filename: String,
    /// Approximate size from the list.
    pub size_bytes: u64,
    /// Download counter from the list.
    pub downloads: u32,
    /// Where the bot sits.
    pub network: NetworkTarget,
}

impl ReleaseOffer {
    /// An offer from a SubsPlease-style announcement on the default network.
    pub fn new(
        title: impl Into<String>,
        episode_label: Option<&str>,
        resolution: impl Into<String>,
        bot: impl Into<String>,
        pack: u32,
    ) -> Self {
        let title = title.into();
        let resolution = resolution.into();
        let group = "SubsPlease".to_string();
        let filename = match episode_label {
            Some(label) => format!("[{group}] {title} - {label} ({resolution}).mkv"),
            None => format!("[{group}] {title} ({resolution}).mkv"),
        };
        Self {
            episode: episode_label.and_then(episode_number),
            episode_label: episode_label.map(str::to_string),
            title,
            resolution,
            group,
            bot: bot.into(),
            pack,
            filename,
            size_bytes: 0,
            downloads: 0,
            network: NetworkTarget::default(),
        }
    }

    /// Replaces the releasing group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Replaces the network.
    #[must_use]
    pub fn with_network(mut self, network: NetworkTarget) -> Self {
        self.network = network;
        self
    }

    /// `[group] title - episode (resolution)`
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.episode_label {
            Some(label) => format!(
                "[{}] {} - {} ({})",
                self.group, self.title, label, self.resolution
            ),
            None => format!("[{}] {} ({})", self.group, self.title, self.resolution),
        }
    }
}

/// Source of candidate offers for a title.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Offers whose title is close to `title`.
    ///
    /// # Errors
    ///
    /// [`CatalogError`] when no candidates could be obtained at all.
    async fn fetch_candidates(&self, title: &str) -> Result<Vec<ReleaseOffer>, CatalogError>;
}

/// In-memory catalog using the same title search as the pack list catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    offers: Vec<ReleaseOffer>,
    cutoff: f64,
}

impl StaticCatalog {
    /// Catalog serving `offers`.
    #[must_use]
    pub fn new(offers: Vec<ReleaseOffer>) -> Self {
        Self {
            offers,
            cutoff: DEFAULT_CUTOFF,
        }
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn fetch_candidates(&self, title: &str) -> Result<Vec<ReleaseOffer>, CatalogError> {
        Ok(filter_by_title(self.offers.clone(), title, self.cutoff))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_offer_derives_episode_and_filename() {
        let offer = ReleaseOffer::new("Frieren", Some("12v2"), "1080p", "CR-HOLLAND|NEW", 9);
        assert_eq!(offer.episode, Some(12));
        assert_eq!(offer.filename, "[SubsPlease] Frieren - 12v2 (1080p).mkv");
        assert_eq!(offer.display_name(), "[SubsPlease] Frieren - 12v2 (1080p)");
    }

    #[tokio::test]
    async fn test_static_catalog_filters_by_title() {
        let catalog = StaticCatalog::new(vec![
            ReleaseOffer::new("No Game No Life", Some("01"), "1080p", "A", 1),
            ReleaseOffer::new("Oshi no Ko", Some("01"), "1080p", "A", 2),
        ]);
        let found = catalog.fetch_candidates("no game no life").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pack, 1);
    }
}
