//! The per-cluster aggregate rebuilt every scrape cycle.

use kmon_types::MetricFamily;
use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::io_rates::IoRates;

/// Everything collected for one cluster in one cycle.
///
/// A value is built once and never mutated; the next cycle produces a new one
/// that replaces it wholesale in the [`MetricsStore`](crate::MetricsStore).
#[derive(Debug, Clone)]
pub struct ClusterMetrics {
    io_rates: IoRates,
    inferred: Vec<MetricFamily>,
    per_broker: BTreeMap<i32, Vec<MetricFamily>>,
    collected_at: SystemTime,
}

impl ClusterMetrics {
    /// Build a snapshot, deriving I/O rates from the broker families.
    pub fn new(inferred: Vec<MetricFamily>, per_broker: BTreeMap<i32, Vec<MetricFamily>>) -> Self {
        Self {
            io_rates: IoRates::scan(&per_broker),
            inferred,
            per_broker,
            collected_at: SystemTime::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), BTreeMap::new())
    }

    pub fn io_rates(&self) -> &IoRates {
        &self.io_rates
    }

    /// Families computed internally rather than scraped.
    pub fn inferred(&self) -> &[MetricFamily] {
        &self.inferred
    }

    pub fn per_broker(&self) -> &BTreeMap<i32, Vec<MetricFamily>> {
        &self.per_broker
    }

    pub fn collected_at(&self) -> SystemTime {
        self.collected_at
    }

    /// Cluster totals across brokers for summable families.
    #[deprecated(note = "cluster totals are kept for old consumers; expose per-broker points instead")]
    #[allow(deprecated)]
    pub fn summarized(&self) -> Vec<MetricFamily> {
        kmon_types::summarize_brokers(&self.per_broker)
    }
}

impl Default for ClusterMetrics {
    fn default() -> Self {
        Self::empty()
    }
}
