//! Runtime configuration for the trade-value and promotions scrapers.
//!
//! Defaults mirror the retailer's live endpoints; every value can be overridden
//! through `TRADEIN_*` environment variables (see [`ScraperConfig::from_env`]).
use crate::normalization::platform::PlatformMap;
use crate::util::env::{env_list, env_opt, env_pairs, env_parse};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.gamestop.ca";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://static-ca.gamestop.ca/images/products";

/// Courtesy pause between enrichment batches, sampled uniformly from `[min_ms, max_ms]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        // tolerate swapped bounds from env
        if min_ms <= max_ms {
            Self { min_ms, max_ms }
        } else {
            Self {
                min_ms: max_ms,
                max_ms: min_ms,
            }
        }
    }

    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

/// Days of the month on which cached product ids are ignored.
///
/// The second day is `day + gap`, wrapped modulo 31 once it passes 31. This is
/// an approximate periodic refresh; short months can skip the wrapped day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSchedule {
    pub day: u32,
    pub gap: u32,
}

impl RefreshSchedule {
    pub fn new(day: u32, gap: u32) -> Self {
        Self { day, gap }
    }

    pub fn second_day(&self) -> u32 {
        let sum = self.day + self.gap;
        if sum <= 31 {
            sum
        } else {
            sum % 31
        }
    }

    pub fn is_forced(&self, day_of_month: u32) -> bool {
        day_of_month == self.day || day_of_month == self.second_day()
    }
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self::new(3, 15)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub base_url: String,
    pub image_base_url: String,
    /// Cache-buster appended to the CSV feed URL.
    pub feed_version: u32,
    pub batch_size: usize,
    pub delay: DelayRange,
    pub platform_map: PlatformMap,
    pub excluded_platforms: Vec<String>,
    pub refresh: RefreshSchedule,
    pub data_dir: PathBuf,
    pub http_timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            feed_version: 9,
            batch_size: 10,
            delay: DelayRange::new(2_000, 6_000),
            platform_map: PlatformMap::default(),
            excluded_platforms: vec!["Comics".to_string()],
            refresh: RefreshSchedule::default(),
            data_dir: PathBuf::from("data"),
            http_timeout_secs: 30,
        }
    }
}

impl ScraperConfig {
    /// Defaults overlaid with `TRADEIN_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        let platform_map = env_pairs("TRADEIN_PLATFORM_CODES")
            .filter(|pairs| !pairs.is_empty())
            .map(PlatformMap::new)
            .unwrap_or(d.platform_map);
        Self {
            base_url: env_opt("TRADEIN_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(d.base_url),
            image_base_url: env_opt("TRADEIN_IMAGE_BASE_URL").unwrap_or(d.image_base_url),
            feed_version: env_parse("TRADEIN_FEED_VERSION", d.feed_version),
            batch_size: env_parse("TRADEIN_BATCH_SIZE", d.batch_size).max(1),
            delay: DelayRange::new(
                env_parse("TRADEIN_DELAY_MIN_MS", d.delay.min_ms),
                env_parse("TRADEIN_DELAY_MAX_MS", d.delay.max_ms),
            ),
            platform_map,
            excluded_platforms: env_list("TRADEIN_EXCLUDED_PLATFORMS")
                .unwrap_or(d.excluded_platforms),
            refresh: RefreshSchedule::new(
                env_parse("TRADEIN_FORCED_DAY", d.refresh.day),
                env_parse("TRADEIN_FORCED_GAP", d.refresh.gap),
            ),
            data_dir: env_opt("TRADEIN_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.data_dir),
            http_timeout_secs: env_parse("TRADEIN_HTTP_TIMEOUT_SECS", d.http_timeout_secs),
        }
    }

    pub fn feed_url(&self) -> String {
        format!(
            "{}/Views/Locale/Content/Microsites/trade-value-lookup/data/Trade_Values.csv?{}",
            self.base_url, self.feed_version
        )
    }

    pub fn feed_referer(&self) -> String {
        format!(
            "{}/Views/Locale/Content/Microsites/trade-value-lookup/index.html",
            self.base_url
        )
    }

    pub fn promotions_url(&self) -> String {
        format!("{}/playdoffers/Index", self.base_url)
    }

    pub fn catalog_search_url(&self) -> String {
        format!("{}/QuickSearch/LoadAutocomplete", self.base_url)
    }

    pub fn catalog_referer(&self) -> String {
        format!("{}/Home/Index", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn forced_days_wrap_past_month_end() {
        let s = RefreshSchedule::new(3, 15);
        assert_eq!(s.second_day(), 18);
        assert!(s.is_forced(3));
        assert!(s.is_forced(18));
        assert!(!s.is_forced(4));

        let wrapped = RefreshSchedule::new(20, 15);
        assert_eq!(wrapped.second_day(), 4);
        assert!(wrapped.is_forced(4));
        assert!(wrapped.is_forced(20));

        let edge = RefreshSchedule::new(16, 15);
        assert_eq!(edge.second_day(), 31);
    }

    #[test]
    fn delay_samples_stay_in_range() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let range = DelayRange::new(50, 10);
        assert_eq!((range.min_ms, range.max_ms), (10, 50));
        for _ in 0..100 {
            let d = range.sample(&mut rng);
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(50));
        }
        assert_eq!(DelayRange::none().sample(&mut rng), Duration::ZERO);
    }

    #[test]
    fn urls_follow_base() {
        let cfg = ScraperConfig {
            base_url: "http://localhost:8080".into(),
            feed_version: 12,
            ..ScraperConfig::default()
        };
        assert_eq!(
            cfg.feed_url(),
            "http://localhost:8080/Views/Locale/Content/Microsites/trade-value-lookup/data/Trade_Values.csv?12"
        );
        assert_eq!(cfg.promotions_url(), "http://localhost:8080/playdoffers/Index");
        assert_eq!(
            cfg.catalog_search_url(),
            "http://localhost:8080/QuickSearch/LoadAutocomplete"
        );
    }
}
