//! Time-gated cache for the expensive upstream endpoints.
//!
//! Only `/domains` and `/lists` are cached: both are large and requested on
//! every scrape. One refresh decision is taken per scrape by
//! [`ApiCache::refresh_time`] and shared by both entries.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::api::{EndpointResult, MailmanClient};
use crate::settings::CacheSettings;

/// Decides whether cached upstream data is stale.
#[derive(Debug, Clone)]
pub struct RefreshGate {
    last_refresh: Option<Instant>,
    interval: Duration,
    enabled: bool,
}

impl RefreshGate {
    pub fn new(interval: Duration, enabled: bool) -> Self {
        Self {
            last_refresh: None,
            interval,
            enabled,
        }
    }

    /// Returns true when data must be refetched at `now`.
    ///
    /// The refresh timestamp is stamped here, at decision time, so a slow
    /// fetch does not extend the freshness window.
    pub fn should_refresh(&mut self, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }
        let stale = self
            .last_refresh
            .map(|last| now.saturating_duration_since(last) > self.interval)
            .unwrap_or(true);
        if stale {
            self.last_refresh = Some(now);
        }
        stale
    }
}

/// Cached result plus "still to fetch in this scrape" marker.
#[derive(Debug, Default)]
struct CacheEntry {
    result: EndpointResult,
    pending: bool,
}

/// Cache in front of the `/domains` and `/lists` upstream calls.
pub struct ApiCache {
    client: MailmanClient,
    gate: RefreshGate,
    domains: CacheEntry,
    lists: CacheEntry,
}

impl ApiCache {
    pub fn new(client: MailmanClient, settings: &CacheSettings) -> Self {
        Self {
            client,
            gate: RefreshGate::new(settings.duration, settings.enabled),
            domains: CacheEntry::default(),
            lists: CacheEntry::default(),
        }
    }

    /// Evaluates the refresh gate. Called once at the start of every scrape.
    pub fn refresh_time(&mut self) {
        self.refresh_time_at(Instant::now());
    }

    /// An entry whose fetch was interrupted (the scrape future was dropped)
    /// stays pending until a later scrape completes it.
    pub fn refresh_time_at(&mut self, now: Instant) {
        let refresh = self.gate.should_refresh(now);
        if refresh {
            debug!("refresh cache data");
        }
        self.domains.pending |= refresh;
        self.lists.pending |= refresh;
    }

    /// Cached `/domains` result, fetched first if this scrape refreshes.
    pub async fn domains(&mut self) -> &EndpointResult {
        if self.domains.pending {
            self.domains.result = self.client.domains().await;
            self.domains.pending = false;
        }
        &self.domains.result
    }

    /// Cached `/lists` result, fetched first if this scrape refreshes.
    pub async fn lists(&mut self) -> &EndpointResult {
        if self.lists.pending {
            self.lists.result = self.client.lists().await;
            self.lists.pending = false;
        }
        &self.lists.result
    }
}
