//! Cross-broker summarization.
//!
//! Folds every broker's families into cluster totals. Only used by older
//! consumers that want one number per metric; the live exposition path keeps
//! each broker's points apart instead.

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::KmonError;
use crate::family::MetricFamily;

/// Merge two families of the same summable kind.
///
/// Points with the same identity are summed; the rest are appended in the
/// order they are met.
pub fn merge_families(
    mut left: MetricFamily,
    right: &MetricFamily,
) -> Result<MetricFamily, KmonError> {
    if left.kind != right.kind || !left.kind.is_summable() {
        return Err(KmonError::NotMergeable {
            name: left.name.clone(),
            left: left.kind,
            right: right.kind,
        });
    }

    for point in &right.points {
        match left.points.iter_mut().find(|p| p.same_identity(point)) {
            Some(existing) => existing.value += point.value,
            None => left.points.push(point.clone()),
        }
    }
    Ok(left)
}

/// Sum per-broker families into one list.
///
/// Histogram, summary and info families have no merge rule and are dropped.
#[deprecated(note = "cluster totals are kept for old consumers; expose per-broker points instead")]
pub fn summarize_brokers(per_broker: &BTreeMap<i32, Vec<MetricFamily>>) -> Vec<MetricFamily> {
    let mut merged: Vec<MetricFamily> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for families in per_broker.values() {
        for family in families {
            if !family.kind.is_summable() {
                continue;
            }
            match index.get(&family.name) {
                None => {
                    index.insert(family.name.clone(), merged.len());
                    merged.push(family.clone());
                }
                Some(&slot) => match merge_families(merged[slot].clone(), family) {
                    Ok(sum) => merged[slot] = sum,
                    Err(e) => debug!(error = %e, "skipping family during summarization"),
                },
            }
        }
    }

    merged
}
