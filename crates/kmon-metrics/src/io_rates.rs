//! Byte-rate figures derived from scraped broker families.

use kmon_types::MetricFamily;
use std::collections::BTreeMap;

const BYTES_IN: &str = "BytesInPerSec";
const BYTES_OUT: &str = "BytesOutPerSec";

/// Per-broker and per-topic fifteen-minute byte rates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IoRates {
    pub broker_bytes_in: BTreeMap<i32, f64>,
    pub broker_bytes_out: BTreeMap<i32, f64>,
    pub topic_bytes_in: BTreeMap<String, f64>,
    pub topic_bytes_out: BTreeMap<String, f64>,
}

impl IoRates {
    /// Scan every broker's families for `BrokerTopicMetrics` rate samples.
    ///
    /// Broker totals come from the first sample labelled only with the rate
    /// name; topic figures are summed across brokers.
    pub fn scan(per_broker: &BTreeMap<i32, Vec<MetricFamily>>) -> Self {
        let mut rates = IoRates::default();
        for (&broker_id, families) in per_broker {
            for family in families.iter().filter(|f| is_rate_family(&f.name)) {
                for point in &family.points {
                    let Some(rate_name) = point.labels.get("name") else {
                        continue;
                    };
                    let (brokers, topics) = if rate_name.eq_ignore_ascii_case(BYTES_IN) {
                        (&mut rates.broker_bytes_in, &mut rates.topic_bytes_in)
                    } else if rate_name.eq_ignore_ascii_case(BYTES_OUT) {
                        (&mut rates.broker_bytes_out, &mut rates.topic_bytes_out)
                    } else {
                        continue;
                    };

                    match point.labels.get("topic") {
                        Some(topic) => *topics.entry(topic.to_string()).or_insert(0.0) += point.value,
                        None if point.labels.len() == 1 => {
                            brokers.entry(broker_id).or_insert(point.value);
                        }
                        None => {}
                    }
                }
            }
        }
        rates
    }

    pub fn is_empty(&self) -> bool {
        self.broker_bytes_in.is_empty()
            && self.broker_bytes_out.is_empty()
            && self.topic_bytes_in.is_empty()
            && self.topic_bytes_out.is_empty()
    }
}

fn is_rate_family(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("brokertopicmetrics") && lower.ends_with("fifteenminuterate")
}
