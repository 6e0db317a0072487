//! Concurrent per-broker scraping for one cluster.

use futures::future::join_all;
use kmon_metrics::exporter;
use kmon_types::MetricFamily;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::{ScrapeConfig, ScrapeKind};
use crate::error::RetrievalError;
use crate::pool::BlockingPool;
use crate::retriever::{BrokerRetriever, ManagementRetriever, TextRetriever};
use crate::topology::Node;

/// Runs one retrieval task per broker and joins the results.
pub struct Scraper {
    cluster: String,
    retriever: Arc<dyn BrokerRetriever>,
}

impl Scraper {
    pub fn new(cluster: impl Into<String>, retriever: Arc<dyn BrokerRetriever>) -> Self {
        Self {
            cluster: cluster.into(),
            retriever,
        }
    }

    /// Pick the retriever matching the configured scrape kind.
    pub fn for_config(
        cluster: impl Into<String>,
        config: &ScrapeConfig,
        pool: BlockingPool,
    ) -> Result<Self, RetrievalError> {
        let retriever: Arc<dyn BrokerRetriever> = match config.kind {
            ScrapeKind::Management => Arc::new(ManagementRetriever::new(config.clone(), pool)),
            ScrapeKind::Text => Arc::new(TextRetriever::new(config.clone())?),
        };
        Ok(Self::new(cluster, retriever))
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Scrape every node concurrently.
    ///
    /// A broker whose retrieval fails is logged and left out of the map; it
    /// never aborts the join.
    pub async fn scrape(&self, nodes: &[Node]) -> BTreeMap<i32, Vec<MetricFamily>> {
        let started = Instant::now();
        let method = self.retriever.method();

        let tasks = nodes.iter().cloned().map(|node| {
            let retriever = self.retriever.clone();
            tokio::spawn(async move {
                let result = retriever.retrieve(&node).await;
                (node, result)
            })
        });

        let mut per_broker = BTreeMap::new();
        for joined in join_all(tasks).await {
            match joined {
                Ok((node, Ok(families))) => {
                    per_broker.insert(node.id, families);
                }
                Ok((node, Err(e))) => {
                    exporter::inc_broker_failure(&self.cluster, method);
                    warn!(
                        cluster = %self.cluster,
                        broker_id = node.id,
                        host = %node.host,
                        error = %e,
                        "broker retrieval failed"
                    );
                }
                Err(e) => {
                    exporter::inc_broker_failure(&self.cluster, method);
                    warn!(cluster = %self.cluster, error = %e, "broker retrieval task failed");
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        exporter::record_scrape(&self.cluster, method, elapsed);
        debug!(
            cluster = %self.cluster,
            brokers = nodes.len(),
            succeeded = per_broker.len(),
            elapsed_secs = elapsed,
            "scrape finished"
        );
        per_broker
    }

    pub fn shutdown(&self) {
        self.retriever.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kmon_types::{Labels, MetricKind};
    use std::time::Duration;

    struct FakeRetriever;

    #[async_trait]
    impl BrokerRetriever for FakeRetriever {
        async fn retrieve(&self, node: &Node) -> Result<Vec<MetricFamily>, RetrievalError> {
            match node.id {
                2 => Err(RetrievalError::Status(503)),
                3 => Ok(Vec::new()),
                4 => panic!("retriever crashed"),
                id => {
                    // Later brokers finish first; the join must not care.
                    tokio::time::sleep(Duration::from_millis(10 * (5 - id as u64))).await;
                    let mut family = MetricFamily::new("up", MetricKind::Gauge);
                    family.gauge_point(Labels::new(), id as f64);
                    Ok(vec![family])
                }
            }
        }

        fn method(&self) -> &'static str {
            "fake"
        }
    }

    #[tokio::test]
    async fn test_partial_failures_do_not_abort_join() {
        let scraper = Scraper::new("c", Arc::new(FakeRetriever));
        let nodes: Vec<_> = (0..5).map(|id| Node::new(id, format!("b{}", id))).collect();

        let per_broker = scraper.scrape(&nodes).await;
        let ids: Vec<_> = per_broker.keys().copied().collect();
        assert_eq!(ids, vec![0, 1, 3]);
        assert_eq!(per_broker[&1][0].points[0].value, 1.0);
        assert!(per_broker[&3].is_empty());
    }

    #[tokio::test]
    async fn test_no_nodes() {
        let scraper = Scraper::new("c", Arc::new(FakeRetriever));
        assert!(scraper.scrape(&[]).await.is_empty());
    }
}
