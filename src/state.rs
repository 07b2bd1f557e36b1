//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use mailman3_exporter::{Mailman3Collector, ScrapeStats, UpstreamStats};
use prometheus::{Gauge, Registry};
use std::sync::Arc;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    /// Self-metrics (process, platform, scrape duration).
    pub registry: Registry,
    pub collector: Mailman3Collector,
    pub scrape_duration: Gauge,
    pub scrape_stats: Arc<ScrapeStats>,
    pub upstream_stats: Arc<UpstreamStats>,
    /// Base URL of the upstream REST API, shown on the landing page.
    pub upstream_url: String,
}
