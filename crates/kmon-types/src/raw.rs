//! Untyped observations from the remote-management path.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

use crate::family::{DataPoint, MetricFamily, MetricKind};
use crate::labels::Labels;

/// A name/labels/value triple with no type information attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub name: String,
    pub labels: Labels,
    pub value: f64,
}

impl RawObservation {
    pub fn new(name: impl Into<String>, labels: Labels, value: f64) -> Self {
        Self {
            name: name.into(),
            labels,
            value,
        }
    }
}

/// Group raw observations into gauge families, one per distinct name.
///
/// Families come out in first-seen name order. The first observation of a
/// name fixes the family's label names: later observations carrying a
/// different set of label names are dropped, as are observations whose label
/// set is already present in the family (first seen wins).
pub fn group_into_families<I>(observations: I) -> impl Iterator<Item = MetricFamily>
where
    I: IntoIterator<Item = RawObservation>,
{
    let mut families: Vec<MetricFamily> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut schemas: Vec<Labels> = Vec::new();

    for obs in observations {
        let slot = match index.get(&obs.name) {
            Some(&slot) => slot,
            None => {
                index.insert(obs.name.clone(), families.len());
                families.push(MetricFamily::new(obs.name.clone(), MetricKind::Gauge));
                schemas.push(obs.labels.clone());
                families.len() - 1
            }
        };

        if !schemas[slot].same_names(&obs.labels) {
            trace!(name = %obs.name, "dropping observation with mismatched label names");
            continue;
        }
        if !families[slot].add_point(DataPoint::new(obs.labels, obs.value)) {
            trace!(name = %obs.name, "dropping observation with duplicate label set");
        }
    }

    families.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    // Which of two same-shaped observations survives is a judgement call; this
    // pins the first-seen behaviour.
    #[test]
    fn test_first_seen_label_names_win() {
        let raw = vec![
            RawObservation::new("m", labels(&[("l1", "v1")]), 1.0),
            RawObservation::new("m", labels(&[("l1", "v11")]), 2.0),
            RawObservation::new("m", labels(&[("l1", "v1"), ("l2", "v2")]), 10.0),
        ];

        let families: Vec<_> = group_into_families(raw).collect();
        assert_eq!(families.len(), 1);

        let family = &families[0];
        assert_eq!(family.name, "m");
        assert_eq!(family.help, "m");
        assert_eq!(family.kind, MetricKind::Gauge);
        assert_eq!(family.points.len(), 2);
        assert_eq!(family.points[0].labels, labels(&[("l1", "v1")]));
        assert_eq!(family.points[0].value, 1.0);
        assert_eq!(family.points[1].labels, labels(&[("l1", "v11")]));
        assert_eq!(family.points[1].value, 2.0);
    }

    #[test]
    fn test_duplicate_label_set_keeps_first_value() {
        let raw = vec![
            RawObservation::new("m", labels(&[("l1", "v1")]), 1.0),
            RawObservation::new("m", labels(&[("l1", "v1")]), 5.0),
        ];
        let families: Vec<_> = group_into_families(raw).collect();
        assert_eq!(families[0].points.len(), 1);
        assert_eq!(families[0].points[0].value, 1.0);
    }

    #[test]
    fn test_preserves_first_seen_name_order() {
        let raw = vec![
            RawObservation::new("b", Labels::new(), 1.0),
            RawObservation::new("a", Labels::new(), 2.0),
            RawObservation::new("b", labels(&[("x", "y")]), 3.0),
        ];
        let names: Vec<_> = group_into_families(raw).map(|f| f.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(group_into_families(Vec::new()).count(), 0);
    }
}
