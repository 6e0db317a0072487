//! Message-topic sink: one JSON record per data point.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use kmon_core::exposition::format_value;
use kmon_types::{DataPoint, MetricFamily};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::MetricsSink;
use crate::error::{ConfigError, SinkError};

/// Synthetic label carrying the sample name.
pub const NAME_LABEL: &str = "__name__";

/// The JSON value written for each data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecord {
    /// Second-resolution ISO-8601 UTC time of the send call
    pub timestamp: String,
    /// Number rendered as text; integral values carry no decimal point
    pub value: String,
    pub name: String,
    /// `__name__` first, then the point labels in order
    pub labels: Map<String, Value>,
}

impl TopicRecord {
    pub fn from_point(family: &MetricFamily, point: &DataPoint, timestamp: &str) -> Self {
        let name = point.sample_name(&family.name);
        let mut labels = Map::new();
        labels.insert(NAME_LABEL.to_string(), Value::String(name.clone()));
        for (key, value) in point.labels.iter() {
            labels.insert(key.to_string(), Value::String(value.to_string()));
        }
        Self {
            timestamp: timestamp.to_string(),
            value: format_value(point.value),
            name,
            labels,
        }
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// One record per (family, point), all stamped with `timestamp`.
pub fn records(families: &[MetricFamily], timestamp: &str) -> Vec<TopicRecord> {
    families
        .iter()
        .flat_map(|family| {
            family
                .points
                .iter()
                .map(move |point| TopicRecord::from_point(family, point, timestamp))
        })
        .collect()
}

/// Key-less producer of UTF-8 payloads. Implementations must not block.
pub trait RecordProducer: Send + Sync + 'static {
    fn produce(&self, topic: &str, payload: String) -> Result<(), SinkError>;
}

pub struct TopicSink<P: RecordProducer> {
    producer: P,
    topic: String,
}

impl<P: RecordProducer> TopicSink<P> {
    pub fn new(producer: P, topic: impl Into<String>) -> Result<Self, ConfigError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(ConfigError::sink("topic", "topic name must not be empty"));
        }
        Ok(Self { producer, topic })
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }
}

#[async_trait]
impl<P: RecordProducer> MetricsSink for TopicSink<P> {
    fn name(&self) -> &'static str {
        "topic"
    }

    /// Hands every record to the producer without waiting for delivery.
    async fn send(&self, families: &[MetricFamily]) -> Result<(), SinkError> {
        let timestamp = format_timestamp(Utc::now());
        let records = records(families, &timestamp);
        let total = records.len();
        let mut rejected = 0;

        for record in records {
            let payload =
                serde_json::to_string(&record).map_err(|e| SinkError::Encode(e.to_string()))?;
            if let Err(e) = self.producer.produce(&self.topic, payload) {
                rejected += 1;
                debug!(topic = %self.topic, error = %e, "record rejected by producer");
            }
        }

        if rejected > 0 {
            return Err(SinkError::Producer(format!(
                "{} of {} records rejected",
                rejected, total
            )));
        }
        debug!(topic = %self.topic, records = total, "records handed to producer");
        Ok(())
    }
}

/// Kafka producer with gzip compression.
#[cfg(feature = "kafka")]
pub struct KafkaProducer {
    inner: rdkafka::producer::FutureProducer,
}

#[cfg(feature = "kafka")]
impl KafkaProducer {
    pub fn new(bootstrap_servers: &str) -> Result<Self, ConfigError> {
        let inner = rdkafka::config::ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("compression.type", "gzip")
            .set("message.timeout.ms", "30000")
            .create()
            .map_err(|e| ConfigError::sink("topic", e.to_string()))?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "kafka")]
impl RecordProducer for KafkaProducer {
    fn produce(&self, topic: &str, payload: String) -> Result<(), SinkError> {
        let record = rdkafka::producer::FutureRecord::<(), str>::to(topic).payload(payload.as_str());
        // Dropping the delivery future does not cancel the send.
        self.inner
            .send_result(record)
            .map(|_delivery| ())
            .map_err(|(e, _)| SinkError::Producer(e.to_string()))
    }
}
