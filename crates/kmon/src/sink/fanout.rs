//! Delivery to every configured sink at once.

use async_trait::async_trait;
use futures::future::join_all;
use kmon_metrics::exporter;
use kmon_types::MetricFamily;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{MetricsSink, PushGatewaySink, RemoteWriteSink};
use crate::config::SinkConfig;
use crate::error::{ConfigError, SinkError};
use crate::pool::BlockingPool;

/// Sends the same batch to each sink concurrently.
///
/// A failing sink is logged and counted; it never affects the others and
/// the fan-out itself always succeeds.
#[derive(Clone, Default)]
pub struct SinkFanOut {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl SinkFanOut {
    pub fn new(sinks: Vec<Arc<dyn MetricsSink>>) -> Self {
        Self { sinks }
    }

    /// Build the sinks named in `config`. Invalid targets fail here, never at
    /// send time.
    pub fn from_config(config: &SinkConfig, pool: BlockingPool) -> Result<Self, ConfigError> {
        let mut sinks: Vec<Arc<dyn MetricsSink>> = Vec::new();

        if let Some(topic) = &config.topic {
            sinks.push(topic_sink(topic)?);
        }
        if let Some(gateway) = &config.push_gateway {
            sinks.push(Arc::new(PushGatewaySink::new(gateway, pool)?));
        }
        if let Some(remote) = &config.remote_write {
            sinks.push(Arc::new(RemoteWriteSink::new(remote)?));
        }

        debug!(sinks = sinks.len(), "sink fan-out configured");
        Ok(Self::new(sinks))
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    /// Deliver `families` to every sink and wait for all of them.
    pub async fn deliver(&self, families: &[MetricFamily]) {
        let sends = self.sinks.iter().map(|sink| async move {
            let result = sink.send(families).await;
            (sink.name(), result)
        });

        for (name, result) in join_all(sends).await {
            match result {
                Ok(()) => exporter::record_sink_delivery(name, "ok"),
                Err(e) => {
                    exporter::record_sink_delivery(name, "error");
                    warn!(sink = name, error = %e, "sink delivery failed");
                }
            }
        }
    }
}

#[cfg(feature = "kafka")]
fn topic_sink(config: &crate::config::TopicSinkConfig) -> Result<Arc<dyn MetricsSink>, ConfigError> {
    if config.bootstrap_servers.trim().is_empty() {
        return Err(ConfigError::sink("topic", "bootstrap_servers must not be empty"));
    }
    let producer = super::KafkaProducer::new(&config.bootstrap_servers)?;
    Ok(Arc::new(super::TopicSink::new(producer, config.topic.clone())?))
}

#[cfg(not(feature = "kafka"))]
fn topic_sink(_: &crate::config::TopicSinkConfig) -> Result<Arc<dyn MetricsSink>, ConfigError> {
    Err(ConfigError::sink(
        "topic",
        "this build has no Kafka support (enable the `kafka` feature)",
    ))
}

#[async_trait]
impl MetricsSink for SinkFanOut {
    fn name(&self) -> &'static str {
        "fan_out"
    }

    async fn send(&self, families: &[MetricFamily]) -> Result<(), SinkError> {
        self.deliver(families).await;
        Ok(())
    }
}
