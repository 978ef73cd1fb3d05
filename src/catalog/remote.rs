//! Production catalog backed by the bots' own pack lists.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::cache::ListCache;
use super::packlist::parse_pack_list;
use super::search::{DEFAULT_CUTOFF, filter_by_title};
use super::{Catalog, CatalogError, ReleaseOffer};
use crate::dcc::{NoopObserver, PendingTransfer, TransferLimits};
use crate::failure::FailureKind;
use crate::irc::{IrcSession, NetworkTarget, SessionConnector, decode_line_bytes};
use crate::xdcc::{cancel_request, request_list};

/// Bots announcing SubsPlease releases on Rizon.
pub const DEFAULT_BOTS: &[&str] = &[
    "CR-HOLLAND|NEW",
    "CR-ARUTHA|NEW",
    "ARUTHA-BATCH|1080p",
    "ARUTHA-BATCH|720p",
    "ARUTHA-BATCH|SD",
];

/// Default bound for a bot to offer its list.
pub const DEFAULT_LIST_REPLY_TIMEOUT: Duration = Duration::from_secs(180);

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Where a bot's pack list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSource {
    /// Bot nickname.
    pub name: String,
    /// HTTP location of the list; `None` means `XDCC SEND list` over IRC.
    pub packlist_url: Option<Url>,
}

impl BotSource {
    /// A bot whose list is requested over IRC.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packlist_url: None,
        }
    }

    /// Fetches the list over HTTP instead.
    #[must_use]
    pub fn with_packlist_url(mut self, url: Url) -> Self {
        self.packlist_url = Some(url);
        self
    }
}

/// The [`DEFAULT_BOTS`] roster.
#[must_use]
pub fn default_bots() -> Vec<BotSource> {
    DEFAULT_BOTS.iter().map(|name| BotSource::new(*name)).collect()
}

/// Catalog that downloads, caches and searches every configured bot's list.
pub struct PackListCatalog {
    network: NetworkTarget,
    bots: Vec<BotSource>,
    connector: Arc<dyn SessionConnector>,
    cache: ListCache,
    http: reqwest::Client,
    cutoff: f64,
    reply_timeout: Duration,
    limits: TransferLimits,
}

impl PackListCatalog {
    /// Catalog for `bots` on `network`. Lists not available over HTTP are
    /// requested through sessions opened by `connector`.
    pub fn new(
        network: NetworkTarget,
        bots: Vec<BotSource>,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("subsplease-dl/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "HTTP client setup failed, using defaults");
                reqwest::Client::new()
            });
        Self {
            network,
            bots,
            connector,
            cache: ListCache::default(),
            http,
            cutoff: DEFAULT_CUTOFF,
            reply_timeout: DEFAULT_LIST_REPLY_TIMEOUT,
            limits: TransferLimits::default(),
        }
    }

    /// Uses another cache directory.
    #[must_use]
    pub fn with_cache(mut self, cache: ListCache) -> Self {
        self.cache = cache;
        self
    }

    /// Title similarity cutoff.
    #[must_use]
    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Bounds for list requests over IRC.
    #[must_use]
    pub fn with_timeouts(mut self, reply_timeout: Duration, limits: TransferLimits) -> Self {
        self.reply_timeout = reply_timeout;
        self.limits = limits;
        self
    }

    async fn list_via_http(&self, bot: &str, url: &Url) -> Result<String, CatalogError> {
        let http_error = |source| CatalogError::Http {
            bot: bot.to_string(),
            url: url.to_string(),
            source,
        };
        let body = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(http_error)?
            .error_for_status()
            .map_err(http_error)?
            .bytes()
            .await
            .map_err(http_error)?;
        debug!(%bot, bytes = body.len(), "fetched pack list over HTTP");
        if let Err(e) = self.cache.store(bot, &body).await {
            warn!(error = %e, "could not cache pack list");
        }
        Ok(decode_line_bytes(&body))
    }

    async fn lists_via_xdcc(&self, bots: &[&BotSource]) -> Vec<(String, String)> {
        if bots.is_empty() {
            return Vec::new();
        }
        let mut session = match self.connector.open(&self.network).await {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    error = %e,
                    network = %self.network,
                    "could not open IRC session for pack lists"
                );
                return Vec::new();
            }
        };

        let mut lists = Vec::new();
        for bot in bots {
            if !session.is_alive() {
                warn!(bot = %bot.name, "IRC session lost, skipping bot");
                continue;
            }
            match self.list_via_xdcc(&mut session, &bot.name).await {
                Ok(text) => lists.push((bot.name.clone(), text)),
                Err(e) => {
                    warn!(bot = %bot.name, error = %e, "could not fetch pack list, skipping bot");
                }
            }
        }
        session.close().await;
        lists
    }

    async fn list_via_xdcc(
        &self,
        session: &mut IrcSession,
        bot: &str,
    ) -> Result<String, CatalogError> {
        self.cache.ensure_dir().await?;
        let offer = match request_list(session, bot, self.reply_timeout).await {
            Ok(offer) => offer,
            Err(source) => {
                if source.kind() == FailureKind::NoResponse
                    && let Err(e) = cancel_request(session, bot)
                {
                    debug!(error = %e, "could not cancel list request");
                }
                return Err(CatalogError::Request {
                    bot: bot.to_string(),
                    source,
                });
            }
        };

        let path = self.cache.path_for(bot);
        PendingTransfer::fresh(offer, &path)
            .run(Arc::new(NoopObserver), self.limits)
            .await
            .map_err(|source| CatalogError::Transfer {
                bot: bot.to_string(),
                source,
            })?;
        self.cache.read(&path).await
    }
}

#[async_trait]
impl Catalog for PackListCatalog {
    #[instrument(skip(self), fields(bots = self.bots.len()))]
    async fn fetch_candidates(&self, title: &str) -> Result<Vec<ReleaseOffer>, CatalogError> {
        let mut lists: Vec<(String, String)> = Vec::new();
        let mut over_http = Vec::new();
        let mut over_xdcc = Vec::new();
        for bot in &self.bots {
            if let Some(text) = self.cache.load(&bot.name).await {
                lists.push((bot.name.clone(), text));
                continue;
            }
            match &bot.packlist_url {
                Some(url) => over_http.push((bot, url)),
                None => over_xdcc.push(bot),
            }
        }

        let fetched = join_all(over_http.into_iter().map(|(bot, url)| async move {
            (bot, self.list_via_http(&bot.name, url).await)
        }))
        .await;
        for (bot, result) in fetched {
            match result {
                Ok(text) => lists.push((bot.name.clone(), text)),
                Err(e) => {
                    warn!(bot = %bot.name, error = %e, "could not fetch pack list, skipping bot");
                }
            }
        }
        lists.extend(self.lists_via_xdcc(&over_xdcc).await);

        if lists.is_empty() && !self.bots.is_empty() {
            let names: Vec<&str> = self.bots.iter().map(|b| b.name.as_str()).collect();
            return Err(CatalogError::Unavailable {
                bots: names.join(", "),
            });
        }

        let offers: Vec<ReleaseOffer> = lists
            .iter()
            .flat_map(|(bot, text)| parse_pack_list(text, bot, &self.network))
            .collect();
        let total = offers.len();
        let found = filter_by_title(offers, title, self.cutoff);
        info!(lists = lists.len(), entries = total, matches = found.len(), "searched pack lists");
        Ok(found)
    }
}
