//! Shared holder of the latest snapshot per cluster.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cluster::ClusterMetrics;

/// Latest [`ClusterMetrics`] per cluster name.
///
/// Snapshots are swapped whole; readers get `Arc`s to values that never change
/// underneath them.
#[derive(Clone, Default)]
pub struct MetricsStore {
    clusters: Arc<RwLock<BTreeMap<String, Arc<ClusterMetrics>>>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a cluster's snapshot, returning the previous one.
    pub async fn replace(
        &self,
        cluster: impl Into<String>,
        metrics: ClusterMetrics,
    ) -> Option<Arc<ClusterMetrics>> {
        let cluster = cluster.into();
        debug!(cluster = %cluster, brokers = metrics.per_broker().len(), "replacing cluster snapshot");
        self.clusters.write().await.insert(cluster, Arc::new(metrics))
    }

    pub async fn remove(&self, cluster: &str) -> Option<Arc<ClusterMetrics>> {
        self.clusters.write().await.remove(cluster)
    }

    pub async fn get(&self, cluster: &str) -> Option<Arc<ClusterMetrics>> {
        self.clusters.read().await.get(cluster).cloned()
    }

    /// Point-in-time view of every cluster.
    pub async fn snapshot(&self) -> BTreeMap<String, Arc<ClusterMetrics>> {
        self.clusters.read().await.clone()
    }
}
