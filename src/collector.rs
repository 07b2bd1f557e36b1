//! Mailman3 metric collector.
//!
//! One call to [`Mailman3Collector::collect`] is one scrape: the cache gate is
//! evaluated once, then every enabled group fetches its data and maps it to
//! metric families. Groups are isolated from each other; a failing endpoint
//! only zeroes or empties its own group's samples.

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::{EndpointResult, ListEntry, MailmanClient, Page, QueueEntry, KNOWN_QUEUES};
use crate::cache::ApiCache;
use crate::family::Family;
use crate::settings::{ExporterSettings, MetricGroups};
use crate::timing::ProcessingTimer;

/// Payload shape of the count-only endpoints (`/domains`, `/users`).
#[derive(Debug, serde::Deserialize)]
struct Total {
    total_size: u64,
}

/// Produces the Mailman3 metric families for each scrape.
pub struct Mailman3Collector {
    client: MailmanClient,
    cache: Mutex<ApiCache>,
    groups: MetricGroups,
    prefix: String,
}

impl Mailman3Collector {
    pub fn new(client: MailmanClient, settings: &ExporterSettings) -> Self {
        let cache = ApiCache::new(client.clone(), &settings.cache);
        debug!("Enabled metric groups: {}", settings.groups.enabled().join(", "));
        Self {
            client,
            cache: Mutex::new(cache),
            groups: settings.groups,
            prefix: settings.prefix(),
        }
    }

    pub fn client(&self) -> &MailmanClient {
        &self.client
    }

    /// Collects all enabled groups plus the processing-time family.
    ///
    /// Concurrent scrapes are serialized on the cache lock so each scrape
    /// takes exactly one refresh decision.
    pub async fn collect(&self) -> Vec<Family> {
        let mut cache = self.cache.lock().await;
        cache.refresh_time();

        let mut processing_time = Family::gauge(
            self.name("processing_time_ms"),
            "Time taken to collect metrics",
            &["method"],
        );
        let mut families = Vec::new();

        if self.groups.domains {
            families.extend(self.collect_domains(&mut cache, &mut processing_time).await);
        }
        if self.groups.lists {
            families.extend(self.collect_lists(&mut cache, &mut processing_time).await);
        }
        if self.groups.up {
            families.extend(self.collect_up(&mut processing_time).await);
        }
        if self.groups.users {
            families.extend(self.collect_users(&mut processing_time).await);
        }
        if self.groups.queue {
            families.extend(self.collect_queue(&mut processing_time).await);
        }

        families.push(processing_time);
        families
    }

    async fn collect_domains(&self, cache: &mut ApiCache, timings: &mut Family) -> Vec<Family> {
        let _timer = ProcessingTimer::start("domains", timings);
        let mut domains = Family::gauge(
            self.name("mailman3_domains"),
            "Number of configured list domains",
            &[],
        );

        let count = total_size("domains", cache.domains().await);
        record(&mut domains, &[], count as f64);
        vec![domains]
    }

    async fn collect_lists(&self, cache: &mut ApiCache, timings: &mut Family) -> Vec<Family> {
        let _timer = ProcessingTimer::start("lists", timings);
        let mut lists = Family::gauge(
            self.name("mailman3_lists"),
            "Number of configured lists",
            &[],
        );
        let mut members = Family::counter(
            self.name("mailman3_list_members"),
            "Count members per list",
            &["list"],
        );

        match parse_page::<ListEntry>("lists", cache.lists().await) {
            Some(page) => {
                record(&mut lists, &[], page.total_size as f64);
                for entry in &page.entries {
                    debug!(
                        "members metric {} value {}",
                        entry.fqdn_listname, entry.member_count
                    );
                    record(
                        &mut members,
                        &[entry.fqdn_listname.as_str()],
                        entry.member_count as f64,
                    );
                }
            }
            None => record(&mut lists, &[], 0.0),
        }
        vec![lists, members]
    }

    async fn collect_up(&self, timings: &mut Family) -> Vec<Family> {
        let _timer = ProcessingTimer::start("up", timings);
        let mut up = Family::gauge(
            self.name("mailman3_up"),
            "Status of mailman-core; 1 if accessible, 0 otherwise",
            &[],
        );

        let reachable = self.client.versions().await.is_success();
        record(&mut up, &[], if reachable { 1.0 } else { 0.0 });
        vec![up]
    }

    async fn collect_users(&self, timings: &mut Family) -> Vec<Family> {
        let _timer = ProcessingTimer::start("users", timings);
        let mut users = Family::counter(
            self.name("mailman3_users"),
            "Number of list users recorded in mailman-core",
            &[],
        );

        let count = total_size("usercount", &self.client.usercount().await);
        record(&mut users, &[], count as f64);
        vec![users]
    }

    async fn collect_queue(&self, timings: &mut Family) -> Vec<Family> {
        let _timer = ProcessingTimer::start("queue", timings);
        let mut queues = Family::gauge(
            self.name("mailman3_queues"),
            "Queue length for mailman-core internal queues",
            &["queue"],
        );
        let mut queue_status = Family::gauge(
            self.name("mailman3_queues_status"),
            "HTTP code for queue status request",
            &[],
        );

        let result = self.client.queues().await;
        if let Some(page) = parse_page::<QueueEntry>("queues", &result) {
            for entry in &page.entries {
                if !KNOWN_QUEUES.contains(&entry.name.as_str()) {
                    debug!("queue {} is not a known mailman-core queue", entry.name);
                }
                debug!("queue metric {} value {}", entry.name, entry.count);
                record(&mut queues, &[entry.name.as_str()], entry.count as f64);
            }
        }
        record(&mut queue_status, &[], f64::from(result.status()));
        vec![queues, queue_status]
    }

    fn name(&self, metric: &str) -> String {
        format!("{}{}", self.prefix, metric)
    }
}

/// `total_size` of a successful count response; 0 on failure or bad payload.
fn total_size(endpoint: &str, result: &EndpointResult) -> u64 {
    match result.parse::<Total>() {
        Some(Ok(total)) => total.total_size,
        Some(Err(e)) => {
            warn!("{}: unexpected payload: {}", endpoint, e);
            0
        }
        None => 0,
    }
}

/// Entries of a successful paged response; `None` on failure or bad payload.
fn parse_page<T: serde::de::DeserializeOwned>(
    endpoint: &str,
    result: &EndpointResult,
) -> Option<Page<T>> {
    match result.parse::<Page<T>>()? {
        Ok(page) => Some(page),
        Err(e) => {
            warn!("{}: unexpected payload: {}", endpoint, e);
            None
        }
    }
}

fn record(family: &mut Family, label_values: &[&str], value: f64) {
    if let Err(e) = family.add_sample(label_values, value) {
        warn!("Dropping sample: {}", e);
    }
}
