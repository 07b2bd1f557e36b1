//! Mailman3 Prometheus Exporter Library
//!
//! This library polls the Mailman3 Core REST API and turns its state into
//! Prometheus metric families. It is independent of the HTTP server that
//! exposes the metrics, so the collector can be embedded in other services.
//!
//! # Features
//!
//! - **Upstream Client**: authenticated calls to the REST API; failures are
//!   folded into status codes instead of errors
//! - **Time-Gated Cache**: `/domains` and `/lists` are refetched at most once
//!   per freshness window
//! - **Fault Isolation**: each metric group degrades to zero/absent samples
//!   on its own
//! - **Processing Time**: per-group timing recorded on every exit path
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mailman3_exporter::{ExporterSettings, MailmanClient, Mailman3Collector, UpstreamStats};
//!
//! # async fn scrape() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ExporterSettings::default();
//! let client = MailmanClient::new(&settings.upstream, Arc::new(UpstreamStats::new()))?;
//! let collector = Mailman3Collector::new(client, &settings);
//!
//! for family in collector.collect().await {
//!     println!("{}: {} samples", family.name(), family.samples().len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod collector;
pub mod family;
pub mod platform;
pub mod settings;
pub mod stats;
pub mod timing;

// Re-export main types for convenience
pub use api::{EndpointResult, MailmanClient};
pub use cache::{ApiCache, RefreshGate};
pub use collector::Mailman3Collector;
pub use family::{Family, FamilyError, FamilyKind, Sample};
pub use settings::{CacheSettings, ExporterSettings, MetricGroups, UpstreamSettings};
pub use stats::{ScrapeStats, UpstreamStats};
pub use timing::ProcessingTimer;
