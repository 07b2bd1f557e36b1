//! Upstream call and scrape statistics for the exporter.
//!
//! This module tracks how often each upstream endpoint was called, how often
//! it failed and which status it returned last, together with scrape timing.
//! The numbers back the `/health` endpoint.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns `(last, avg, max, min, count)`.
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Per-endpoint call bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointStats {
    pub calls: u64,
    pub failures: u64,
    pub last_status: u16,
}

/// Upstream call counters, keyed by endpoint name (`domains`, `lists`, ...).
#[derive(Default)]
pub struct UpstreamStats {
    endpoints: DashMap<&'static str, EndpointStats>,
}

impl UpstreamStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records the outcome of one upstream call.
    pub fn record(&self, endpoint: &'static str, status: u16, success: bool) {
        let mut entry = self.endpoints.entry(endpoint).or_default();
        entry.calls += 1;
        if !success {
            entry.failures += 1;
        }
        entry.last_status = status;
    }

    pub fn get(&self, endpoint: &str) -> Option<EndpointStats> {
        self.endpoints.get(endpoint).map(|e| *e)
    }

    /// Number of upstream calls made for `endpoint` so far.
    pub fn calls(&self, endpoint: &str) -> u64 {
        self.get(endpoint).map(|e| e.calls).unwrap_or(0)
    }

    /// Snapshot of all endpoints, sorted by name.
    pub fn snapshot(&self) -> Vec<(&'static str, EndpointStats)> {
        let mut out: Vec<_> = self
            .endpoints
            .iter()
            .map(|e| (*e.key(), *e.value()))
            .collect();
        out.sort_by_key(|(name, _)| *name);
        out
    }
}

/// Scrape-level statistics for the `/metrics` endpoint.
pub struct ScrapeStats {
    pub scrapes: AtomicU64,
    pub encode_failures: AtomicU64,
    pub scrape_duration_ms: Stat,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl Default for ScrapeStats {
    fn default() -> Self {
        Self {
            scrapes: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            scrape_duration_ms: Stat::default(),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

impl ScrapeStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_scrape(&self, duration_ms: f64) {
        self.scrapes.fetch_add(1, Ordering::Relaxed);
        self.scrape_duration_ms.add_sample(duration_ms);
    }

    pub fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Renders scrape and upstream statistics as a plain-text table.
    pub fn render_table(&self, upstream: &UpstreamStats) -> String {
        let mut out = String::new();
        let (last, avg, max, _min, _count) = self.scrape_duration_ms.snapshot();

        writeln!(out, "SCRAPES").ok();
        writeln!(out, "=======").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "{:25} | {:>10} | {:>10} | {:>10}",
            "Metric", "Last", "Avg", "Max"
        )
        .ok();
        writeln!(out, "{}", "-".repeat(64)).ok();
        writeln!(
            out,
            "{:25} | {:>10.2} | {:>10.2} | {:>10.2}",
            "scrape_duration_ms", last, avg, max
        )
        .ok();
        writeln!(out).ok();
        writeln!(
            out,
            "Total scrapes:    {}",
            self.scrapes.load(Ordering::Relaxed)
        )
        .ok();
        writeln!(
            out,
            "Encode failures:  {}",
            self.encode_failures.load(Ordering::Relaxed)
        )
        .ok();
        writeln!(
            out,
            "Started at:       {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .ok();
        writeln!(out).ok();

        writeln!(out, "UPSTREAM").ok();
        writeln!(out, "========").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "{:25} | {:>10} | {:>10} | {:>11}",
            "Endpoint", "Calls", "Failures", "Last status"
        )
        .ok();
        writeln!(out, "{}", "-".repeat(65)).ok();
        for (name, stats) in upstream.snapshot() {
            writeln!(
                out,
                "{:25} | {:>10} | {:>10} | {:>11}",
                name, stats.calls, stats.failures, stats.last_status
            )
            .ok();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stat() {
        let mut stat = RunningStat::default();
        stat.add(4.0);
        stat.add(2.0);
        stat.add(6.0);
        assert_eq!(stat.avg(), 4.0);
        assert_eq!(stat.min, 2.0);
        assert_eq!(stat.max, 6.0);
        assert_eq!(stat.last, 6.0);
    }

    #[test]
    fn test_upstream_stats_record() {
        let stats = UpstreamStats::new();
        stats.record("lists", 200, true);
        stats.record("lists", 500, false);
        stats.record("domains", 200, true);

        let lists = stats.get("lists").unwrap();
        assert_eq!(lists.calls, 2);
        assert_eq!(lists.failures, 1);
        assert_eq!(lists.last_status, 500);
        assert_eq!(stats.calls("domains"), 1);
        assert_eq!(stats.calls("queues"), 0);

        let names: Vec<_> = stats.snapshot().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["domains", "lists"]);
    }

    #[test]
    fn test_render_table_lists_endpoints() {
        let upstream = UpstreamStats::new();
        upstream.record("versions", 503, false);
        let scrapes = ScrapeStats::new();
        scrapes.record_scrape(12.5);

        let table = scrapes.render_table(&upstream);
        assert!(table.contains("versions"));
        assert!(table.contains("503"));
        assert!(table.contains("Total scrapes:    1"));
    }

    #[test]
    fn test_render_table_counts_scrapes_and_encode_failures() {
        let scrapes = ScrapeStats::new();
        scrapes.record_scrape(3.0);
        scrapes.record_scrape(5.0);
        scrapes.record_encode_failure();

        assert_eq!(scrapes.scrapes.load(Ordering::Relaxed), 2);
        let table = scrapes.render_table(&UpstreamStats::new());
        assert!(table.contains("Total scrapes:    2"));
        assert!(table.contains("Encode failures:  1"));
    }
}
