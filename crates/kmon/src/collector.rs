//! One scrape cycle of one cluster, start to finish.

use kmon_metrics::expose::{group_by_name, labeled_families};
use kmon_metrics::{ClusterMetrics, MetricsStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::inferred::infer_families;
use crate::scraper::Scraper;
use crate::sink::SinkFanOut;
use crate::topology::ClusterDescription;

/// Scrapes a cluster, publishes the new snapshot and hands it to the sinks.
pub struct ClusterCollector {
    scraper: Scraper,
    store: MetricsStore,
    sinks: Arc<SinkFanOut>,
}

impl ClusterCollector {
    pub fn new(scraper: Scraper, store: MetricsStore, sinks: Arc<SinkFanOut>) -> Self {
        Self {
            scraper,
            store,
            sinks,
        }
    }

    pub fn cluster(&self) -> &str {
        self.scraper.cluster()
    }

    /// Run one cycle.
    ///
    /// The snapshot is stored before this returns. Sink delivery runs on its
    /// own task; its handle is returned so callers may wait for it, and is
    /// `None` when no sink is configured.
    pub async fn run_cycle(&self, description: &ClusterDescription) -> Option<JoinHandle<()>> {
        let per_broker = self.scraper.scrape(&description.nodes).await;
        let metrics = ClusterMetrics::new(infer_families(description), per_broker);

        info!(
            cluster = %self.cluster(),
            brokers = description.nodes.len(),
            reporting = metrics.per_broker().len(),
            "scrape cycle complete"
        );

        let delivery = if self.sinks.is_empty() {
            None
        } else {
            let families = group_by_name(labeled_families(self.cluster(), &metrics));
            let sinks = self.sinks.clone();
            Some(tokio::spawn(async move {
                sinks.deliver(&families).await;
            }))
        };

        self.store.replace(self.cluster(), metrics).await;
        delivery
    }

    pub fn shutdown(&self) {
        self.scraper.shutdown();
    }
}
