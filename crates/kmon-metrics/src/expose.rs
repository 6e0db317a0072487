//! Multi-cluster exposition.
//!
//! Every family is tagged with the cluster it came from and broker families
//! with the broker that reported them. Families are then regrouped by name so
//! each metric has one `HELP`/`TYPE` block; regrouping concatenates points and
//! never adds values together.

use kmon_core::exposition::write_exposition;
use kmon_types::MetricFamily;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::cluster::ClusterMetrics;

pub const CLUSTER_LABEL: &str = "cluster";
pub const BROKER_LABEL: &str = "broker_id";

/// A cluster's inferred and broker families with identifying labels attached.
pub fn labeled_families(cluster: &str, metrics: &ClusterMetrics) -> Vec<MetricFamily> {
    let mut families = Vec::new();

    for family in metrics.inferred() {
        let mut family = family.clone();
        family.inject_label(CLUSTER_LABEL, cluster);
        families.push(family);
    }

    for (broker_id, broker_families) in metrics.per_broker() {
        let broker_id = broker_id.to_string();
        for family in broker_families {
            let mut family = family.clone();
            family.inject_label(BROKER_LABEL, &broker_id);
            family.inject_label(CLUSTER_LABEL, cluster);
            families.push(family);
        }
    }

    families
}

/// Merge families sharing a name by concatenating their points.
///
/// The first family seen for a name decides its help, unit and kind. A later
/// family of another kind is dropped whole.
pub fn group_by_name(families: impl IntoIterator<Item = MetricFamily>) -> Vec<MetricFamily> {
    let mut grouped: Vec<MetricFamily> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for family in families {
        match index.get(&family.name) {
            Some(&slot) => {
                let target = &mut grouped[slot];
                if target.kind != family.kind {
                    debug!(
                        name = %family.name,
                        kept = %target.kind,
                        dropped = %family.kind,
                        "kind conflict while regrouping, keeping first kind"
                    );
                    continue;
                }
                for point in family.points {
                    target.add_point(point);
                }
            }
            None => {
                index.insert(family.name.clone(), grouped.len());
                grouped.push(family);
            }
        }
    }

    grouped
}

/// Render one cluster as an exposition document.
pub fn expose_cluster(cluster: &str, metrics: &ClusterMetrics) -> String {
    write_exposition(&group_by_name(labeled_families(cluster, metrics)))
}

/// Render every cluster as a single exposition document.
pub fn expose_clusters(clusters: &BTreeMap<String, Arc<ClusterMetrics>>) -> String {
    let families = clusters
        .iter()
        .flat_map(|(name, metrics)| labeled_families(name, metrics));
    write_exposition(&group_by_name(families))
}
