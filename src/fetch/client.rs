use crate::config::ScraperConfig;
use crate::enrichment::{CatalogHit, CatalogLookup};
use crate::fetch::headers::{HeaderProfile, RequestKind};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

/// Outbound calls to the retailer: CSV price feed, promotions page, catalog search.
///
/// No retries; any transport or status failure is returned to the caller.
#[derive(Debug, Clone)]
pub struct Fetcher {
    http: Client,
    profile: HeaderProfile,
    feed_url: String,
    feed_referer: String,
    promotions_url: String,
    search_url: String,
    search_referer: String,
}

impl Fetcher {
    pub fn new(cfg: &ScraperConfig, profile: HeaderProfile) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs.max(1)))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            profile,
            feed_url: cfg.feed_url(),
            feed_referer: cfg.feed_referer(),
            promotions_url: cfg.promotions_url(),
            search_url: cfg.catalog_search_url(),
            search_referer: cfg.catalog_referer(),
        })
    }

    async fn get_text(
        &self,
        url: &str,
        kind: RequestKind,
        referer: Option<&str>,
        query: &[(&str, String)],
    ) -> Result<String> {
        let headers = self.profile.headers(kind, referer)?;
        let resp = self
            .http
            .get(url)
            .headers(headers)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 500);
            return Err(anyhow!("GET {url} returned {status}: {body}"));
        }
        let body = resp
            .text()
            .await
            .with_context(|| format!("reading body of {url}"))?;
        debug!(url, bytes = body.len(), ?kind, "fetched");
        Ok(body)
    }

    /// Raw CSV body of the trade-value feed.
    pub async fn fetch_trade_feed(&self) -> Result<String> {
        let body = self
            .get_text(&self.feed_url, RequestKind::Csv, Some(&self.feed_referer), &[])
            .await?;
        info!(bytes = body.len(), "downloaded trade value feed");
        Ok(body)
    }

    /// Raw HTML of the promotions page. An empty body is an error.
    pub async fn fetch_promotions_page(&self) -> Result<String> {
        let body = self
            .get_text(&self.promotions_url, RequestKind::Html, None, &[])
            .await?;
        if body.trim().is_empty() {
            bail!("no data found at {}", self.promotions_url);
        }
        Ok(body)
    }

    /// Catalog autocomplete search for one SKU.
    ///
    /// Returns the first candidate when it carries at least one product id.
    pub async fn search_product(&self, sku: u64) -> Result<Option<CatalogHit>> {
        let body = self
            .get_text(
                &self.search_url,
                RequestKind::Json,
                Some(&self.search_referer),
                &[("term", sku.to_string())],
            )
            .await?;
        let candidates: Vec<CatalogHit> = serde_json::from_str(&body)
            .with_context(|| format!("catalog search for sku {sku} returned invalid JSON"))?;
        Ok(candidates
            .into_iter()
            .next()
            .filter(|hit| !hit.products_id.is_empty()))
    }
}

#[async_trait]
impl CatalogLookup for Fetcher {
    async fn lookup(&self, sku: u64) -> Result<Option<CatalogHit>> {
        self.search_product(sku).await
    }
}
