//! Dated JSON snapshots on disk.
//!
//! Every save writes `{dataset}_{YYYY-MM-DD}.json` plus `{dataset}_latest.json`
//! with identical content (`.min.json` for minified output). Dated copies
//! accumulate; the latest copy is overwritten each run.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub date: String,
    pub count: usize,
    pub data: Vec<T>,
}

impl<T> Snapshot<T> {
    pub fn new(date: impl Into<String>, data: Vec<T>) -> Self {
        Self {
            date: date.into(),
            count: data.len(),
            data,
        }
    }
}

/// Paths written by one [`SnapshotStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSnapshot {
    pub dated: PathBuf,
    pub latest: PathBuf,
    pub count: usize,
}

fn extension(minify: bool) -> &'static str {
    if minify {
        ".min.json"
    } else {
        ".json"
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn latest_path(&self, dataset: &str, minify: bool) -> PathBuf {
        self.dir
            .join(format!("{dataset}_latest{}", extension(minify)))
    }

    pub fn dated_path(&self, dataset: &str, date: NaiveDate, minify: bool) -> PathBuf {
        self.dir.join(format!(
            "{dataset}_{}{}",
            date.format(DATE_FORMAT),
            extension(minify)
        ))
    }

    /// Save under today's UTC date.
    pub fn save<T: Serialize>(&self, records: &[T], dataset: &str, minify: bool) -> Result<SavedSnapshot> {
        self.save_on(records, dataset, minify, Utc::now().date_naive())
    }

    pub fn save_on<T: Serialize>(
        &self,
        records: &[T],
        dataset: &str,
        minify: bool,
        date: NaiveDate,
    ) -> Result<SavedSnapshot> {
        #[derive(Serialize)]
        struct Borrowed<'a, T> {
            date: String,
            count: usize,
            data: &'a [T],
        }

        let snapshot = Borrowed {
            date: date.format(DATE_FORMAT).to_string(),
            count: records.len(),
            data: records,
        };
        let body = if minify {
            serde_json::to_string(&snapshot)
        } else {
            serde_json::to_string_pretty(&snapshot)
        }
        .with_context(|| format!("serializing {dataset} snapshot"))?;

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating snapshot dir {}", self.dir.display()))?;

        let dated = self.dated_path(dataset, date, minify);
        let latest = self.latest_path(dataset, minify);
        for path in [&dated, &latest] {
            fs::write(path, &body).with_context(|| format!("writing {}", path.display()))?;
        }
        info!(
            dataset,
            count = records.len(),
            path = %dated.display(),
            "saved snapshot"
        );
        Ok(SavedSnapshot {
            dated,
            latest,
            count: records.len(),
        })
    }

    /// Latest snapshot for `dataset`, preferring the minified copy. `None` if neither exists.
    pub fn load_latest<T: DeserializeOwned>(&self, dataset: &str) -> Result<Option<Snapshot<T>>> {
        for minify in [true, false] {
            let path = self.latest_path(dataset, minify);
            if !path.is_file() {
                continue;
            }
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let snapshot: Snapshot<T> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;
            debug!(dataset, path = %path.display(), count = snapshot.count, "loaded latest snapshot");
            return Ok(Some(snapshot));
        }
        Ok(None)
    }

    /// Delete dated files of `dataset` older than the `keep` most recent dates.
    /// `latest` files and other datasets are left alone. Returns removed paths.
    pub fn prune(&self, dataset: &str, keep: usize) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let prefix = format!("{dataset}_");
        let mut dated: Vec<(NaiveDate, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("listing {}", self.dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix(&prefix) else { continue };
            let stem = rest
                .strip_suffix(".min.json")
                .or_else(|| rest.strip_suffix(".json"));
            let Some(date) = stem.and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok()) else {
                continue;
            };
            dated.push((date, entry.path()));
        }

        let kept: BTreeSet<NaiveDate> = dated
            .iter()
            .map(|(d, _)| *d)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .rev()
            .take(keep)
            .collect();

        let mut removed = Vec::new();
        for (date, path) in dated {
            if kept.contains(&date) {
                continue;
            }
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
            removed.push(path);
        }
        removed.sort();
        info!(dataset, keep, removed = removed.len(), "pruned snapshots");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::record::TradeRecord;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn sample() -> Vec<TradeRecord> {
        let mut a = TradeRecord::new(729016, "Super Mario Odyssey", "Nintendo Switch", 12.5);
        a.product_id = Some("P1".into());
        a.link = Some("/Switch/Games/P1".into());
        a.img = Some("/729016/{1min}{2med}{3max}.jpg".into());
        vec![a, TradeRecord::new(100200, "Spider-Man 2", "Playstation 5", 40.0)]
    }

    #[test]
    fn save_then_load_latest_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("data"));
        let records = sample();

        let saved = store.save(&records, "trade_values", false).unwrap();
        assert!(saved.dated.is_file() && saved.latest.is_file());
        assert_eq!(
            fs::read_to_string(&saved.dated).unwrap(),
            fs::read_to_string(&saved.latest).unwrap()
        );

        let loaded: Snapshot<TradeRecord> = store.load_latest("trade_values").unwrap().unwrap();
        assert_eq!(loaded.count, 2);
        assert_eq!(loaded.data, records);
        assert_eq!(loaded.date, Utc::now().date_naive().format(DATE_FORMAT).to_string());
    }

    #[test]
    fn minified_latest_is_preferred() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.save_on(&sample(), "trade_values", false, day(1)).unwrap();
        store.save_on(&sample()[..1], "trade_values", true, day(2)).unwrap();

        let min_body = fs::read_to_string(store.latest_path("trade_values", true)).unwrap();
        assert!(!min_body.contains('\n'));

        let loaded: Snapshot<TradeRecord> = store.load_latest("trade_values").unwrap().unwrap();
        assert_eq!(loaded.count, 1);
        assert_eq!(loaded.date, "2025-01-02");
    }

    #[test]
    fn missing_latest_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("absent"));
        let loaded: Option<Snapshot<TradeRecord>> = store.load_latest("trade_values").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn latest_is_overwritten_dated_accumulate() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.save_on(&sample(), "promotions", false, day(1)).unwrap();
        store.save_on(&sample()[..1], "promotions", false, day(2)).unwrap();

        assert!(store.dated_path("promotions", day(1), false).is_file());
        assert!(store.dated_path("promotions", day(2), false).is_file());
        let latest: Snapshot<TradeRecord> = store.load_latest("promotions").unwrap().unwrap();
        assert_eq!(latest.count, 1);
    }

    #[test]
    fn prune_keeps_recent_dates_and_latest() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        for d in 1..=4 {
            store.save_on(&sample(), "trade_values", false, day(d)).unwrap();
        }
        store.save_on(&sample(), "trade_values", true, day(1)).unwrap();
        store.save_on(&sample(), "promotions", false, day(1)).unwrap();

        let removed = store.prune("trade_values", 2).unwrap();
        assert_eq!(removed.len(), 3);
        assert!(!store.dated_path("trade_values", day(1), false).exists());
        assert!(!store.dated_path("trade_values", day(1), true).exists());
        assert!(store.dated_path("trade_values", day(3), false).is_file());
        assert!(store.dated_path("trade_values", day(4), false).is_file());
        assert!(store.latest_path("trade_values", false).is_file());
        assert!(store.latest_path("trade_values", true).is_file());
        assert!(store.dated_path("promotions", day(1), false).is_file());
    }

    #[test]
    fn save_into_a_file_path_fails() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let store = SnapshotStore::new(&blocker);
        assert!(store.save(&sample(), "trade_values", false).is_err());
    }
}
