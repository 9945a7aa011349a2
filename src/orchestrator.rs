use crate::config::ScraperConfig;
use crate::enrichment::{CatalogLookup, EnrichmentEngine};
use crate::fetch::client::Fetcher;
use crate::fetch::headers::HeaderProfile;
use crate::normalization::record::{parse_feed, RecordNormalizer, TradeRecord};
use crate::promotions::{PromotionOffer, PromotionParser};
use crate::snapshot::{SavedSnapshot, Snapshot, SnapshotStore};
use anyhow::{Context, Result};
use tracing::{error, info, warn};

pub const TRADE_VALUES_DATASET: &str = "trade_values";
pub const PROMOTIONS_DATASET: &str = "promotions";

/// Feed body -> normalized, capped and enriched records.
///
/// Split out from [`Orchestrator`] so the pipeline runs against any catalog lookup.
pub async fn trade_values_from_feed<L: CatalogLookup>(
    feed_csv: &str,
    normalizer: &RecordNormalizer,
    engine: &EnrichmentEngine<L>,
    prior: Option<&Snapshot<TradeRecord>>,
    maximum: Option<usize>,
) -> Result<Vec<TradeRecord>> {
    let rows = parse_feed(feed_csv)?;
    let mut records = normalizer.normalize(&rows);
    info!(products = records.len(), "found products after filters");

    if let Some(max) = maximum {
        records.truncate(max);
    }
    if !records.is_empty() {
        engine.enrich(&mut records, prior).await;
    }
    info!(remaining = records.len(), "trade values ready");
    Ok(records)
}

/// Composes fetch -> normalize -> enrich -> save for trade values, and
/// fetch -> scrape -> save for promotions.
pub struct Orchestrator {
    cfg: ScraperConfig,
    fetcher: Fetcher,
    store: SnapshotStore,
}

impl Orchestrator {
    /// One header profile per run; it is reused by every request.
    pub fn new(cfg: ScraperConfig) -> Result<Self> {
        let profile = HeaderProfile::random();
        info!(profile = %profile, "using browser profile");
        let fetcher = Fetcher::new(&cfg, profile)?;
        let store = SnapshotStore::new(cfg.data_dir.clone());
        Ok(Self::with_parts(cfg, fetcher, store))
    }

    pub fn with_parts(cfg: ScraperConfig, fetcher: Fetcher, store: SnapshotStore) -> Self {
        Self {
            cfg,
            fetcher,
            store,
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Latest saved trade values, if any.
    pub fn latest_trade_values(&self) -> Result<Option<Snapshot<TradeRecord>>> {
        self.store.load_latest(TRADE_VALUES_DATASET)
    }

    pub async fn fetch_trade_values(&self, maximum: Option<usize>) -> Result<Vec<TradeRecord>> {
        let run = async {
            let prior = self
                .latest_trade_values()
                .context("loading previous trade value snapshot")?;
            let body = self.fetcher.fetch_trade_feed().await?;
            let normalizer = RecordNormalizer::from_config(&self.cfg);
            let engine = EnrichmentEngine::from_config(self.fetcher.clone(), &self.cfg);
            trade_values_from_feed(&body, &normalizer, &engine, prior.as_ref(), maximum).await
        };
        run.await.map_err(|err| {
            error!(error = %err, "error fetching products");
            err
        })
    }

    /// Returns `None` without writing when the feed produced no records, so the
    /// previous snapshot stays usable as a cache.
    pub async fn fetch_and_save_trade_values(
        &self,
        maximum: Option<usize>,
        minify: bool,
    ) -> Result<Option<SavedSnapshot>> {
        let records = self.fetch_trade_values(maximum).await?;
        if records.is_empty() {
            warn!("no trade values to save; keeping previous snapshot");
            return Ok(None);
        }
        self.store
            .save(&records, TRADE_VALUES_DATASET, minify)
            .map(Some)
            .map_err(|err| {
                error!(error = %err, "error saving trade values");
                err
            })
    }

    pub async fn fetch_promotions(&self) -> Result<Vec<PromotionOffer>> {
        let run = async {
            let html = self.fetcher.fetch_promotions_page().await?;
            let offers = PromotionParser::new()?.parse(&html);
            info!(promotions = offers.len(), "found promotions");
            Ok::<_, anyhow::Error>(offers)
        };
        run.await.map_err(|err| {
            error!(error = %err, "error fetching promotions");
            err
        })
    }

    pub async fn fetch_and_save_promotions(&self, minify: bool) -> Result<SavedSnapshot> {
        let offers = self.fetch_promotions().await?;
        self.store
            .save(&offers, PROMOTIONS_DATASET, minify)
            .map_err(|err| {
                error!(error = %err, "error saving promotions");
                err
            })
    }
}
