//! Families computed from the cluster description rather than scraped.

use kmon_types::{Labels, MetricFamily, MetricKind};

use crate::topology::ClusterDescription;

fn gauge(name: &str, help: &str) -> MetricFamily {
    MetricFamily::new(name, MetricKind::Gauge).with_help(help)
}

pub fn infer_families(description: &ClusterDescription) -> Vec<MetricFamily> {
    let mut brokers = gauge("broker_count", "Number of brokers in the cluster");
    brokers.gauge_point(Labels::new(), description.nodes.len() as f64);

    let mut families = vec![brokers];

    if let Some(controller) = description.controller {
        let mut family = gauge("broker_controller_id", "Id of the active controller broker");
        family.gauge_point(Labels::new(), controller as f64);
        families.push(family);
    }

    let mut topics = gauge("topic_count", "Number of topics in the cluster");
    topics.gauge_point(Labels::new(), description.topics.len() as f64);
    families.push(topics);

    let mut partitions = gauge("topic_partitions", "Number of partitions per topic");
    let mut under_replicated = gauge(
        "topic_under_replicated_partitions",
        "Partitions whose in-sync replica set is smaller than the replica set",
    );
    let mut in_sync = gauge(
        "topic_in_sync_replicas",
        "In-sync replicas summed over the partitions of a topic",
    );

    for topic in &description.topics {
        let labels = Labels::new().with("topic", topic.name.as_str());
        partitions.gauge_point(labels.clone(), topic.partitions.len() as f64);
        under_replicated.gauge_point(
            labels.clone(),
            topic
                .partitions
                .iter()
                .filter(|p| p.is_under_replicated())
                .count() as f64,
        );
        in_sync.gauge_point(
            labels,
            topic.partitions.iter().map(|p| p.isr.len()).sum::<usize>() as f64,
        );
    }

    families.extend(
        [partitions, under_replicated, in_sync]
            .into_iter()
            .filter(|family| !family.is_empty()),
    );
    families
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Node, PartitionDescription, TopicDescription};

    fn partition(id: i32, replicas: Vec<i32>, isr: Vec<i32>) -> PartitionDescription {
        PartitionDescription {
            id,
            leader: replicas.first().copied(),
            replicas,
            isr,
        }
    }

    #[test]
    fn test_inferred_from_description() {
        let description = ClusterDescription::new(
            "c",
            vec![Node::new(1, "b1"), Node::new(2, "b2")],
        )
        .with_controller(2)
        .with_topic(TopicDescription {
            name: "orders".to_string(),
            partitions: vec![
                partition(0, vec![1, 2], vec![1, 2]),
                partition(1, vec![1, 2], vec![2]),
            ],
        });

        let families = infer_families(&description);
        let names: Vec<_> = families.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "broker_count",
                "broker_controller_id",
                "topic_count",
                "topic_partitions",
                "topic_under_replicated_partitions",
                "topic_in_sync_replicas",
            ]
        );

        let values: Vec<_> = families.iter().map(|f| f.points[0].value).collect();
        assert_eq!(values, vec![2.0, 2.0, 1.0, 2.0, 1.0, 3.0]);
        assert_eq!(families[3].points[0].labels.get("topic"), Some("orders"));
    }

    #[test]
    fn test_no_topics_or_controller() {
        let families = infer_families(&ClusterDescription::new("c", Vec::new()));
        let names: Vec<_> = families.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["broker_count", "topic_count"]);
        assert_eq!(families[0].points[0].value, 0.0);
    }
}
