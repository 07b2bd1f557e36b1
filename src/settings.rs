//! Resolved, immutable exporter settings.
//!
//! The binary merges CLI flags, environment variables and config files into
//! an [`ExporterSettings`] once at startup; everything downstream only reads it.

use serde::Serialize;
use std::time::Duration;

/// REST API version path segment used for every upstream request.
pub const DEFAULT_MAILMAN_API_VERSION: &str = "3.1";
pub const DEFAULT_MAILMAN_ADDRESS: &str = "http://mailman-core:8001";
pub const DEFAULT_MAILMAN_USERNAME: &str = "restadmin";
pub const DEFAULT_MAILMAN_PASSWORD: &str = "restpass";
pub const DEFAULT_CACHE_DURATION_SECS: u64 = 30;

/// Connection details for the Mailman3 Core REST API.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamSettings {
    /// Base address without trailing slash, e.g. `http://mailman-core:8001`.
    pub address: String,
    pub api_version: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout; `None` keeps the HTTP client default.
    pub timeout: Option<Duration>,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_MAILMAN_ADDRESS.to_string(),
            api_version: DEFAULT_MAILMAN_API_VERSION.to_string(),
            username: DEFAULT_MAILMAN_USERNAME.to_string(),
            password: DEFAULT_MAILMAN_PASSWORD.to_string(),
            timeout: None,
        }
    }
}

/// Enable flags for the individual metric groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricGroups {
    pub domains: bool,
    pub lists: bool,
    pub up: bool,
    pub users: bool,
    pub queue: bool,
}

impl Default for MetricGroups {
    fn default() -> Self {
        Self {
            domains: true,
            lists: true,
            up: true,
            users: true,
            queue: true,
        }
    }
}

impl MetricGroups {
    /// Names of the enabled groups, in collection order.
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            ("domains", self.domains),
            ("lists", self.lists),
            ("up", self.up),
            ("users", self.users),
            ("queue", self.queue),
        ]
        .into_iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Time-gated cache settings for the expensive upstream endpoints.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheSettings {
    pub enabled: bool,
    pub duration: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duration: Duration::from_secs(DEFAULT_CACHE_DURATION_SECS),
        }
    }
}

/// Configuration snapshot handed to the collector and the upstream client.
#[derive(Debug, Clone, Serialize)]
pub struct ExporterSettings {
    pub upstream: UpstreamSettings,
    pub groups: MetricGroups,
    pub cache: CacheSettings,
    /// Metric name namespace; empty means no prefix.
    pub namespace: String,
    pub enable_process_metrics: bool,
    pub enable_platform_metrics: bool,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            upstream: UpstreamSettings::default(),
            groups: MetricGroups::default(),
            cache: CacheSettings::default(),
            namespace: String::new(),
            enable_process_metrics: true,
            enable_platform_metrics: true,
        }
    }
}

impl ExporterSettings {
    /// Prefix prepended to every metric name (`"<namespace>_"` or empty).
    pub fn prefix(&self) -> String {
        metric_prefix(&self.namespace)
    }
}

/// Builds the metric name prefix for a namespace.
pub fn metric_prefix(namespace: &str) -> String {
    if namespace.is_empty() {
        String::new()
    } else {
        format!("{namespace}_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_for_empty_namespace() {
        assert_eq!(metric_prefix(""), "");
        assert_eq!(ExporterSettings::default().prefix(), "");
    }

    #[test]
    fn test_prefix_for_namespace() {
        let settings = ExporterSettings {
            namespace: "foo".into(),
            ..Default::default()
        };
        assert_eq!(settings.prefix(), "foo_");
    }

    #[test]
    fn test_self_metrics_enabled_by_default() {
        let settings = ExporterSettings::default();
        assert!(settings.enable_process_metrics);
        assert!(settings.enable_platform_metrics);
        assert!(settings.cache.enabled);
        assert_eq!(settings.groups, MetricGroups::default());
    }

    #[test]
    fn test_enabled_groups_keep_collection_order() {
        let groups = MetricGroups {
            lists: false,
            users: false,
            ..Default::default()
        };
        assert_eq!(groups.enabled(), vec!["domains", "up", "queue"]);
        assert_eq!(
            MetricGroups::default().enabled(),
            vec!["domains", "lists", "up", "users", "queue"]
        );
    }
}
