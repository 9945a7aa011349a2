use crate::config::ScraperConfig;
use crate::normalization::platform::{strip_platform_suffix, PlatformMap};
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// One CSV row keyed by lower_snake_case column name, in feed column order.
pub type RawRow = IndexMap<String, String>;

/// A priced trade-in item. `product_id`, `img` and `link` stay `None` until enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub name: String,
    pub platform: String,
    pub sku: u64,
    #[serde(rename = "productId", default)]
    pub product_id: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
}

impl TradeRecord {
    pub fn new(sku: u64, name: impl Into<String>, platform: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            platform: platform.into(),
            sku,
            product_id: None,
            price,
            link: None,
            img: None,
        }
    }
}

/// `"Item Description"` -> `"item_description"`.
pub fn normalize_column(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Parse the feed body into rows with normalized column names.
pub fn parse_feed(body: &str) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .context("trade value feed has no header row")?
        .iter()
        .map(normalize_column)
        .collect();

    let mut rows = Vec::new();
    for (idx, rec) in reader.records().enumerate() {
        let rec = rec.with_context(|| format!("malformed CSV record #{}", idx + 1))?;
        let row: RawRow = headers
            .iter()
            .cloned()
            .zip(rec.iter().map(str::to_string))
            .collect();
        rows.push(row);
    }
    debug!(rows = rows.len(), columns = headers.len(), "parsed trade value feed");
    Ok(rows)
}

/// `"$12.50"` -> `12.5`. Thousands separators are tolerated; negatives are rejected.
pub fn parse_price(raw: &str) -> Result<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let price: f64 = cleaned
        .trim()
        .parse()
        .with_context(|| format!("invalid price {raw:?}"))?;
    if !price.is_finite() || price < 0.0 {
        bail!("price out of range: {raw:?}");
    }
    Ok(price)
}

/// Predicates that drop a record from the normalized feed.
#[derive(Debug, Clone)]
pub enum RecordFilter {
    /// Platform short code (after mapping) is in the set.
    ExcludedPlatform(HashSet<String>),
    /// Lower-cased name contains the needle.
    NameContains(String),
}

impl RecordFilter {
    pub fn rejects(&self, record: &TradeRecord, platforms: &PlatformMap) -> bool {
        match self {
            RecordFilter::ExcludedPlatform(set) => {
                set.contains(platforms.code_for(&record.platform))
            }
            RecordFilter::NameContains(needle) => {
                record.name.to_lowercase().contains(needle.as_str())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    platforms: PlatformMap,
    filters: Vec<RecordFilter>,
}

impl RecordNormalizer {
    pub fn new(platforms: PlatformMap, excluded_platforms: &[String]) -> Self {
        let filters = vec![
            RecordFilter::ExcludedPlatform(excluded_platforms.iter().cloned().collect()),
            RecordFilter::NameContains("console".to_string()),
            RecordFilter::NameContains("controller".to_string()),
        ];
        Self { platforms, filters }
    }

    pub fn from_config(cfg: &ScraperConfig) -> Self {
        Self::new(cfg.platform_map.clone(), &cfg.excluded_platforms)
    }

    /// Map one row to a record. Columns other than sku/item_description/platform/values are dropped.
    pub fn normalize_row(&self, row: &RawRow) -> Result<TradeRecord> {
        let field = |key: &str| {
            row.get(key)
                .map(String::as_str)
                .ok_or_else(|| anyhow!("missing column {key}"))
        };
        let sku_raw = field("sku")?;
        let sku: u64 = sku_raw
            .trim()
            .parse()
            .with_context(|| format!("invalid sku {sku_raw:?}"))?;
        let name = strip_platform_suffix(field("item_description")?);
        let platform = field("platform")?.trim().to_string();
        let price = parse_price(field("values")?)?;
        Ok(TradeRecord::new(sku, name, platform, price))
    }

    pub fn keeps(&self, record: &TradeRecord) -> bool {
        !self
            .filters
            .iter()
            .any(|f| f.rejects(record, &self.platforms))
    }

    /// Normalize and filter, preserving feed order. Unparsable rows are logged and skipped.
    pub fn normalize(&self, rows: &[RawRow]) -> Vec<TradeRecord> {
        let mut skipped = 0usize;
        let mut filtered = 0usize;
        let mut out = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let record = match self.normalize_row(row) {
                Ok(r) => r,
                Err(err) => {
                    skipped += 1;
                    warn!(row = idx + 1, error = %err, "skipping malformed trade value row");
                    continue;
                }
            };
            if self.keeps(&record) {
                out.push(record);
            } else {
                filtered += 1;
            }
        }
        info!(
            kept = out.len(),
            filtered, skipped, "normalized trade value feed"
        );
        out
    }
}
