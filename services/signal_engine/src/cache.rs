//! Persisted bar cache
//!
//! One CSV file per (symbol, interval) pair under the cache directory:
//! `datetime,open,high,low,close,volume`, ISO-8601 UTC datetimes, ascending,
//! unique. Appending merges by timestamp with last-write-wins on collision,
//! re-sorts, and truncates to the retained row limit. A cache can also be
//! bootstrapped from an externally exported CSV.

use crate::error::{EngineError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use trendwire_types::{Bar, Series, Timeframe};

const CSV_HEADER: &str = "datetime,open,high,low,close,volume";

#[derive(Debug, Clone)]
pub struct BarCache {
    dir: PathBuf,
    max_rows: usize,
}

impl BarCache {
    pub fn new(dir: impl Into<PathBuf>, max_rows: usize) -> Self {
        Self {
            dir: dir.into(),
            max_rows,
        }
    }

    /// Cache file for a (symbol, interval) pair. Path separators and colons in
    /// the symbol are not filesystem-safe and map to underscores.
    pub fn path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        let safe_symbol = symbol.replace(['/', ':'], "_");
        self.dir
            .join(format!("{}__{}.csv", safe_symbol, timeframe.interval()))
    }

    /// Load the cached series, `None` when no file exists yet.
    pub fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<Series>> {
        let path = self.path(symbol, timeframe);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let bars = parse_csv(&content, &path)?;
        Ok(Some(Series::normalized(bars)))
    }

    /// Persist a series, truncated to the newest `max_rows` bars.
    pub fn save(&self, symbol: &str, timeframe: Timeframe, series: &Series) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut trimmed = series.clone();
        trimmed.truncate_front(self.max_rows);
        let path = self.path(symbol, timeframe);
        std::fs::write(&path, render_csv(&trimmed))?;
        debug!(rows = trimmed.len(), path = %path.display(), "saved bar cache");
        Ok(())
    }

    /// Merge new bars into the cached history and return the merged series.
    ///
    /// Dedup is by timestamp with the new batch winning collisions; the result
    /// is re-sorted ascending and truncated to `max_rows`.
    pub fn append(&self, symbol: &str, timeframe: Timeframe, new: &Series) -> Result<Series> {
        let merged = match self.load(symbol, timeframe)? {
            Some(existing) => {
                let mut bars = existing.into_bars();
                bars.extend_from_slice(new.bars());
                Series::normalized(bars)
            }
            None => new.clone(),
        };
        let mut merged = merged;
        merged.truncate_front(self.max_rows);
        self.save(symbol, timeframe, &merged)?;
        Ok(merged)
    }

    /// Seed the cache for a pair from an externally exported CSV file.
    pub fn bootstrap(&self, symbol: &str, timeframe: Timeframe, csv: &Path) -> Result<Series> {
        let content = std::fs::read_to_string(csv)?;
        let series = Series::normalized(parse_csv(&content, csv)?);
        self.save(symbol, timeframe, &series)?;
        info!(
            rows = series.len(),
            symbol, %timeframe, "bootstrapped bar cache from {}", csv.display()
        );
        Ok(series)
    }
}

fn parse_csv(content: &str, path: &Path) -> Result<Vec<Bar>> {
    let mut bars = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || (lineno == 0 && line.starts_with("datetime")) {
            continue;
        }
        bars.push(parse_row(line).ok_or_else(|| EngineError::Cache {
            message: format!("{}:{}: malformed row '{line}'", path.display(), lineno + 1),
        })?);
    }
    Ok(bars)
}

fn parse_row(line: &str) -> Option<Bar> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 5 {
        return None;
    }
    let timestamp = parse_datetime(fields[0])?;
    let open = fields[1].parse().ok()?;
    let high = fields[2].parse().ok()?;
    let low = fields[3].parse().ok()?;
    let close = fields[4].parse().ok()?;
    // Volume column may be absent in bootstrap exports; default to 1.
    let volume = fields
        .get(5)
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v as u64)
        .unwrap_or(1);
    Some(
        Bar::new(timestamp, open, high, low, close).with_volume(volume),
    )
}

/// ISO-8601, timezone-naive (assumed UTC) or explicit offset.
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

fn render_csv(series: &Series) -> String {
    let mut out = String::with_capacity(series.len() * 48 + CSV_HEADER.len() + 1);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for bar in series.bars() {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(minutes * 60, 0).unwrap()
    }

    fn bars(range: std::ops::Range<i64>, close_offset: f64) -> Series {
        Series::new(
            range
                .map(|i| {
                    let c = 100.0 + i as f64 + close_offset;
                    Bar::new(ts(i * 5), c, c + 1.0, c - 1.0, c)
                })
                .collect(),
        )
        .unwrap()
    }

    fn cache(dir: &TempDir, max_rows: usize) -> BarCache {
        BarCache::new(dir.path(), max_rows)
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, 2000);
        let series = bars(0..5, 0.0);
        cache.save("XAU/USD", Timeframe::M5, &series).unwrap();
        let loaded = cache.load("XAU/USD", Timeframe::M5).unwrap().unwrap();
        assert_eq!(loaded, series);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        assert!(cache(&dir, 2000)
            .load("XAU/USD", Timeframe::H1)
            .unwrap()
            .is_none());
    }

    #[test]
    fn append_merges_with_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, 2000);
        // Existing rows T0..T4, new batch T3..T6 with different closes.
        cache.save("XAU/USD", Timeframe::M5, &bars(0..5, 0.0)).unwrap();
        let merged = cache
            .append("XAU/USD", Timeframe::M5, &bars(3..7, 50.0))
            .unwrap();

        assert_eq!(merged.len(), 7);
        let closes = merged.closes();
        assert_eq!(closes[2], 102.0); // T2 from the old batch
        assert_eq!(closes[3], 153.0); // T3 overwritten by the new batch
        assert_eq!(closes[4], 154.0); // T4 overwritten by the new batch
        let stamps: Vec<_> = merged.bars().iter().map(|b| b.timestamp).collect();
        let mut sorted = stamps.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(stamps, sorted);

        // The merge was persisted, not just returned.
        let reloaded = cache.load("XAU/USD", Timeframe::M5).unwrap().unwrap();
        assert_eq!(reloaded, merged);
    }

    #[test]
    fn append_truncates_to_max_rows() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, 4);
        cache.save("XAU/USD", Timeframe::M5, &bars(0..4, 0.0)).unwrap();
        let merged = cache
            .append("XAU/USD", Timeframe::M5, &bars(4..6, 0.0))
            .unwrap();
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.bars()[0].timestamp, ts(10)); // oldest two dropped
    }

    #[test]
    fn symbol_is_sanitized_in_filename() {
        let dir = TempDir::new().unwrap();
        let path = cache(&dir, 10).path("XAU/USD", Timeframe::M15);
        assert!(path.ends_with("XAU_USD__15min.csv"));
    }

    #[test]
    fn bootstrap_reads_naive_datetimes() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, 2000);
        let csv_path = dir.path().join("boot.csv");
        std::fs::write(
            &csv_path,
            "datetime,open,high,low,close,volume\n\
             2020-01-01 00:00:00,1.0,2.0,0.5,1.5,1\n\
             2020-01-01 00:05:00,1.5,2.5,1.0,2.0,1\n",
        )
        .unwrap();
        let series = cache
            .bootstrap("BOOT/ME", Timeframe::M5, &csv_path)
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(
            series.bars()[0].timestamp,
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(cache.load("BOOT/ME", Timeframe::M5).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn malformed_rows_are_reported() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, 2000);
        let path = cache.path("XAU/USD", Timeframe::M5);
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(&path, "datetime,open,high,low,close,volume\nnot,a,bar\n").unwrap();
        let err = cache.load("XAU/USD", Timeframe::M5).unwrap_err();
        assert!(matches!(err, EngineError::Cache { .. }));
    }
}
