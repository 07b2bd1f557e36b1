//! Mailman3 Core REST API client.
//!
//! Every call returns an [`EndpointResult`]: upstream failures of any kind are
//! folded into a status code at this boundary and never propagate further.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::settings::UpstreamSettings;
use crate::stats::UpstreamStats;

/// Status reported for transport-level failures (connect, timeout, bad body).
pub const TRANSPORT_FAILURE_STATUS: u16 = 500;

/// Maximum number of body bytes included in diagnostic log lines.
const BODY_SNIPPET_LEN: usize = 160;

/// Whether an upstream status code counts as success.
pub fn is_success_status(status: u16) -> bool {
    (200..220).contains(&status)
}

/// Outcome of one upstream call.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointResult {
    /// Status in `[200, 220)` with the parsed response body.
    Success { status: u16, body: Value },
    /// Any other status. Status `0` means the endpoint was never fetched.
    Failure { status: u16 },
}

impl Default for EndpointResult {
    fn default() -> Self {
        EndpointResult::Failure { status: 0 }
    }
}

impl EndpointResult {
    pub fn status(&self) -> u16 {
        match self {
            EndpointResult::Success { status, .. } | EndpointResult::Failure { status } => *status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EndpointResult::Success { .. })
    }

    /// Response body; `Value::Null` for failures.
    pub fn payload(&self) -> &Value {
        static EMPTY: Value = Value::Null;
        match self {
            EndpointResult::Success { body, .. } => body,
            EndpointResult::Failure { .. } => &EMPTY,
        }
    }

    /// Deserializes the body of a successful call.
    ///
    /// Returns `None` for failures, `Some(Err(_))` when the body has an
    /// unexpected shape.
    pub fn parse<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        match self {
            EndpointResult::Success { body, .. } => Some(T::deserialize(body)),
            EndpointResult::Failure { .. } => None,
        }
    }
}

/// Paged collection envelope shared by the list-style endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub total_size: u64,
    #[serde(default = "Vec::new")]
    pub entries: Vec<T>,
}

/// Entry of the `/lists` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ListEntry {
    pub fqdn_listname: String,
    #[serde(default)]
    pub member_count: u64,
}

/// Entry of the `/queues` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueEntry {
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

/// Queue names Mailman3 Core is known to report.
pub const KNOWN_QUEUES: [&str; 12] = [
    "archive", "bad", "bounces", "command", "digest", "in", "nntp", "out", "pipeline", "retry",
    "shunt", "virgin",
];

/// Authenticated client for the Mailman3 Core REST API.
#[derive(Clone)]
pub struct MailmanClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    stats: Arc<UpstreamStats>,
}

impl MailmanClient {
    /// Creates a client from upstream settings.
    pub fn new(
        settings: &UpstreamSettings,
        stats: Arc<UpstreamStats>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        let client = Self {
            http: builder.build()?,
            base_url: format!(
                "{}/{}",
                settings.address.trim_end_matches('/'),
                settings.api_version
            ),
            username: settings.username.clone(),
            password: settings.password.clone(),
            stats,
        };
        info!("Querying Mailman at URL: <{}>", client.url("/"));
        Ok(client)
    }

    /// Joins the base address, API version and an endpoint path.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    pub fn stats(&self) -> &Arc<UpstreamStats> {
        &self.stats
    }

    /// Liveness probe; also reports the running Mailman version.
    pub async fn versions(&self) -> EndpointResult {
        self.get("versions", "/system/versions").await
    }

    /// Number of users; only one record is requested since just `total_size` is used.
    pub async fn usercount(&self) -> EndpointResult {
        self.get("usercount", "/users?count=1&page=1").await
    }

    pub async fn domains(&self) -> EndpointResult {
        self.get("domains", "/domains").await
    }

    pub async fn lists(&self) -> EndpointResult {
        self.get("lists", "/lists").await
    }

    pub async fn queues(&self) -> EndpointResult {
        self.get("queues", "/queues").await
    }

    async fn get(&self, name: &'static str, endpoint: &str) -> EndpointResult {
        let result = self.fetch(name, endpoint).await;
        self.stats.record(name, result.status(), result.is_success());
        result
    }

    async fn fetch(&self, name: &str, endpoint: &str) -> EndpointResult {
        let url = self.url(endpoint);
        debug!("{}: GET {}", name, url);

        let response = match self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("{}(exception): {}", name, e);
                return EndpointResult::Failure {
                    status: TRANSPORT_FAILURE_STATUS,
                };
            }
        };

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                error!("{}(exception): {}", name, e);
                return EndpointResult::Failure {
                    status: TRANSPORT_FAILURE_STATUS,
                };
            }
        };

        if !is_success_status(status) {
            debug!("{}: url {} returned {}", name, url, status);
            debug!("{}: content {}", name, snippet(&body));
            return EndpointResult::Failure { status };
        }

        match serde_json::from_slice(&body) {
            Ok(body) => EndpointResult::Success { status, body },
            Err(e) => {
                error!("{}(exception): malformed JSON from {}: {}", name, url, e);
                debug!("{}: content {}", name, snippet(&body));
                EndpointResult::Failure {
                    status: TRANSPORT_FAILURE_STATUS,
                }
            }
        }
    }
}

/// First bytes of a response body, lossily decoded for logging.
fn snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(&body[..body.len().min(BODY_SNIPPET_LEN)]).into_owned()
}
