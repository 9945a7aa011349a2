//! Product-id enrichment for normalized trade records.
//!
//! Records are processed in fixed-size batches. Inside a batch every record is
//! resolved concurrently, either from the previous snapshot or through a remote
//! catalog search, and written back in place so output order always equals
//! input order. Batches run strictly one after another with a randomized
//! courtesy pause in between, which caps outbound concurrency at the batch size.
//!
//! On forced-refresh days the previous snapshot is ignored and every record
//! goes to the catalog, so drift in catalog ids or images is picked up.

use crate::config::{DelayRange, RefreshSchedule, ScraperConfig};
use crate::normalization::platform::PlatformMap;
use crate::normalization::record::TradeRecord;
use crate::snapshot::Snapshot;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Size-suffix token in catalog image paths, expanded to a multi-size placeholder.
pub const IMAGE_SIZE_TOKEN: &str = "1min";
pub const IMAGE_SIZE_PLACEHOLDER: &str = "{1min}{2med}{3max}";

/// One candidate from the catalog autocomplete endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogHit {
    /// Ids arrive as strings or numbers depending on the product.
    #[serde(rename = "productsId", default)]
    pub products_id: Vec<Value>,
    #[serde(rename = "imagePath", default)]
    pub image_path: Option<String>,
}

impl CatalogHit {
    pub fn first_product_id(&self) -> Option<String> {
        match self.products_id.first()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Remote product lookup keyed by SKU.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn lookup(&self, sku: u64) -> Result<Option<CatalogHit>>;
}

#[derive(Debug, Clone, Copy)]
pub struct EnrichOptions {
    pub batch_size: usize,
    pub delay: DelayRange,
    pub refresh: RefreshSchedule,
}

impl EnrichOptions {
    pub fn from_config(cfg: &ScraperConfig) -> Self {
        Self {
            batch_size: cfg.batch_size,
            delay: cfg.delay,
            refresh: cfg.refresh,
        }
    }
}

/// Previous snapshot indexed by SKU string. First occurrence wins.
#[derive(Debug, Default)]
pub struct PriorIndex<'a> {
    by_sku: HashMap<String, &'a TradeRecord>,
}

impl<'a> PriorIndex<'a> {
    pub fn new(records: &'a [TradeRecord]) -> Self {
        let mut by_sku = HashMap::with_capacity(records.len());
        for r in records {
            by_sku.entry(r.sku.to_string()).or_insert(r);
        }
        Self { by_sku }
    }

    pub fn get(&self, sku: u64) -> Option<&'a TradeRecord> {
        self.by_sku.get(&sku.to_string()).copied()
    }

    fn len(&self) -> usize {
        self.by_sku.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Cached,
    Remote,
    NotFound,
    Failed,
}

/// Per-run counters returned by [`EnrichmentEngine::enrich`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichStats {
    pub cached: usize,
    pub remote: usize,
    pub not_found: usize,
    pub failed: usize,
    pub batches: usize,
    pub forced_refresh: bool,
}

impl EnrichStats {
    fn record(&mut self, r: Resolution) {
        match r {
            Resolution::Cached => self.cached += 1,
            Resolution::Remote => self.remote += 1,
            Resolution::NotFound => self.not_found += 1,
            Resolution::Failed => self.failed += 1,
        }
    }
}

pub struct EnrichmentEngine<L> {
    lookup: L,
    platforms: PlatformMap,
    image_base_url: String,
    options: EnrichOptions,
}

impl<L: CatalogLookup> EnrichmentEngine<L> {
    pub fn new(
        lookup: L,
        platforms: PlatformMap,
        image_base_url: impl Into<String>,
        options: EnrichOptions,
    ) -> Self {
        Self {
            lookup,
            platforms,
            image_base_url: image_base_url.into(),
            options,
        }
    }

    pub fn from_config(lookup: L, cfg: &ScraperConfig) -> Self {
        Self::new(
            lookup,
            cfg.platform_map.clone(),
            cfg.image_base_url.clone(),
            EnrichOptions::from_config(cfg),
        )
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Enrich using today's local date for the forced-refresh check.
    pub async fn enrich(
        &self,
        records: &mut [TradeRecord],
        prior: Option<&Snapshot<TradeRecord>>,
    ) -> EnrichStats {
        self.enrich_on(records, prior, Local::now().date_naive()).await
    }

    /// Resolve `product_id`, `img` and `link` for every record, in place.
    ///
    /// Never fails: lookup errors are logged and leave that record unresolved.
    pub async fn enrich_on(
        &self,
        records: &mut [TradeRecord],
        prior: Option<&Snapshot<TradeRecord>>,
        today: NaiveDate,
    ) -> EnrichStats {
        let forced = self.options.refresh.is_forced(today.day());
        let index = prior.map(|s| PriorIndex::new(&s.data));
        let cache = if forced { None } else { index.as_ref() };
        if forced {
            info!(day = today.day(), "forced refresh day; ignoring cached product ids");
        } else if let Some(idx) = cache {
            debug!(cached_skus = idx.len(), "using previous snapshot as cache");
        }

        let batch_size = self.options.batch_size.max(1);
        let total_batches = records.len().div_ceil(batch_size);
        let mut stats = EnrichStats {
            forced_refresh: forced,
            ..EnrichStats::default()
        };

        for (n, chunk) in records.chunks_mut(batch_size).enumerate() {
            let outcomes = join_all(chunk.iter_mut().map(|rec| self.resolve(rec, cache))).await;
            for r in outcomes {
                stats.record(r);
            }
            stats.batches += 1;
            debug!(batch = n + 1, of = total_batches, "enrichment batch complete");

            if n + 1 < total_batches {
                let pause = self.options.delay.sample(&mut rand::thread_rng());
                tokio::time::sleep(pause).await;
            }
        }

        info!(
            cached = stats.cached,
            remote = stats.remote,
            not_found = stats.not_found,
            failed = stats.failed,
            batches = stats.batches,
            "enrichment finished"
        );
        stats
    }

    async fn resolve(&self, record: &mut TradeRecord, cache: Option<&PriorIndex<'_>>) -> Resolution {
        if let Some(hit) = cache.and_then(|idx| idx.get(record.sku)) {
            record.product_id = hit.product_id.clone();
            record.img = hit.img.clone();
            record.link = self.link_for(record);
            return Resolution::Cached;
        }

        let outcome = match self.lookup.lookup(record.sku).await {
            Ok(Some(hit)) => match hit.first_product_id() {
                Some(id) => {
                    record.img = self.rewrite_image(hit.image_path.as_deref());
                    record.product_id = Some(id);
                    Resolution::Remote
                }
                None => {
                    record.product_id = None;
                    Resolution::NotFound
                }
            },
            Ok(None) => {
                record.product_id = None;
                Resolution::NotFound
            }
            Err(err) => {
                warn!(sku = record.sku, platform = %record.platform, error = %err, "catalog lookup failed");
                record.product_id = None;
                record.img = None;
                Resolution::Failed
            }
        };
        record.link = self.link_for(record);
        outcome
    }

    /// `/{platform code}/Games/{product id}`, or `None` without a product id.
    pub fn link_for(&self, record: &TradeRecord) -> Option<String> {
        record
            .product_id
            .as_ref()
            .map(|id| format!("/{}/Games/{}", self.platforms.code_for(&record.platform), id))
    }

    /// Strip the image host prefix and expand the size token into the size placeholder.
    pub fn rewrite_image(&self, path: Option<&str>) -> Option<String> {
        let path = path?;
        let relative = if self.image_base_url.is_empty() {
            path.to_string()
        } else {
            path.replacen(self.image_base_url.as_str(), "", 1)
        };
        let img = relative.replacen(IMAGE_SIZE_TOKEN, IMAGE_SIZE_PLACEHOLDER, 1);
        (!img.is_empty()).then_some(img)
    }
}
