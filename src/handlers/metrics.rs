//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs one collection against the Mailman3 REST API and
//! returns the result, together with the exporter's self-metrics, in the
//! Prometheus text format.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use mailman3_exporter::family::to_proto_families;
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument, warn};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let collected = state.collector.collect().await;
    let (mut families, errors) = to_proto_families(&collected);
    for e in &errors {
        warn!("Skipping metric family: {}", e);
    }

    // Self-metrics after the Mailman families
    families.extend(state.registry.gather());

    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        state.scrape_stats.record_encode_failure();
        return Err(MetricsError::EncodingFailed);
    }

    let elapsed = start.elapsed();
    state
        .scrape_stats
        .record_scrape(elapsed.as_secs_f64() * 1000.0);
    state.scrape_duration.set(elapsed.as_secs_f64());

    debug!(
        "Metrics request completed: {} families, {} bytes, {:.3}ms",
        families.len(),
        buffer.len(),
        elapsed.as_secs_f64() * 1000.0
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::{body::Body, http::Request, routing::get, Router};
    use httpmock::prelude::*;
    use mailman3_exporter::settings::MetricGroups;
    use mailman3_exporter::{
        ExporterSettings, Mailman3Collector, MailmanClient, ScrapeStats, UpstreamSettings,
        UpstreamStats,
    };
    use prometheus::{Gauge, Registry};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(server: &MockServer, groups: MetricGroups) -> (Router, SharedState) {
        let settings = ExporterSettings {
            upstream: UpstreamSettings {
                address: server.base_url(),
                ..Default::default()
            },
            groups,
            namespace: "test".into(),
            ..Default::default()
        };
        let upstream_stats = Arc::new(UpstreamStats::new());
        let client = MailmanClient::new(&settings.upstream, upstream_stats.clone()).unwrap();

        let registry = Registry::new();
        let scrape_duration = Gauge::new(
            "test_mailman3_exporter_scrape_duration_seconds",
            "Duration of the previous /metrics request",
        )
        .unwrap();
        registry.register(Box::new(scrape_duration.clone())).unwrap();

        let state = Arc::new(AppState {
            registry,
            collector: Mailman3Collector::new(client, &settings),
            scrape_duration,
            scrape_stats: Arc::new(ScrapeStats::new()),
            upstream_stats,
            upstream_url: server.base_url(),
        });
        let router = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(state.clone());
        (router, state)
    }

    async fn scrape(router: Router) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint_exposes_up_and_timing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/3.1/system/versions");
                then.status(200)
                    .json_body(serde_json::json!({"mailman_version": "GNU Mailman 3.3.9"}));
            })
            .await;

        let groups = MetricGroups {
            domains: false,
            lists: false,
            up: true,
            users: false,
            queue: false,
        };
        let (router, state) = app(&server, groups);
        let (status, body) = scrape(router).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# TYPE test_mailman3_up gauge"));
        assert!(body.contains("test_mailman3_up 1"));
        assert!(body.contains("test_processing_time_ms{method=\"up\"}"));
        assert!(body.contains("test_mailman3_exporter_scrape_duration_seconds"));
        assert!(!body.contains("test_mailman3_domains"));

        assert_eq!(state.scrape_stats.scrapes.load(Ordering::Relaxed), 1);
        assert_eq!(state.upstream_stats.calls("versions"), 1);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_survives_upstream_outage() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(503).body("maintenance");
            })
            .await;

        let (router, _state) = app(&server, MetricGroups::default());
        let (status, body) = scrape(router).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("test_mailman3_up 0"));
        assert!(body.contains("test_mailman3_domains 0"));
        assert!(body.contains("test_mailman3_lists 0"));
        assert!(body.contains("test_mailman3_users 0"));
        assert!(body.contains("test_mailman3_queues_status 503"));
        for group in ["domains", "lists", "up", "users", "queue"] {
            assert!(body.contains(&format!("test_processing_time_ms{{method=\"{group}\"}}")));
        }
    }
}
