//! Trade-in value and promotions scraper.
//!
//! Pulls the retailer's trade-value CSV feed, normalizes it, resolves catalog
//! product ids (reusing the previous snapshot where possible) and persists
//! dated JSON snapshots. The promotions page is scraped into structured offers
//! and stored the same way.

pub mod config;
pub mod enrichment;
pub mod fetch;
pub mod logging;
pub mod normalization;
pub mod orchestrator;
pub mod promotions;
pub mod query;
pub mod snapshot;

pub mod util {
    pub mod env;
}

pub use config::ScraperConfig;
pub use enrichment::{CatalogHit, CatalogLookup, EnrichmentEngine};
pub use normalization::record::TradeRecord;
pub use orchestrator::Orchestrator;
pub use promotions::PromotionOffer;
pub use snapshot::{Snapshot, SnapshotStore};
