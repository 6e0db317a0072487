//! Outbound delivery of metric families.

pub mod fanout;
pub mod push_gateway;
pub mod remote_write;
pub mod topic;

use async_trait::async_trait;
use kmon_types::MetricFamily;

use crate::error::SinkError;

pub use fanout::SinkFanOut;
pub use push_gateway::PushGatewaySink;
pub use remote_write::RemoteWriteSink;
pub use topic::{RecordProducer, TopicRecord, TopicSink};

#[cfg(feature = "kafka")]
pub use topic::KafkaProducer;

/// A destination for a batch of families.
///
/// Errors stay local to the sink that produced them.
#[async_trait]
pub trait MetricsSink: Send + Sync + 'static {
    /// Label used for this sink in logs and self metrics.
    fn name(&self) -> &'static str;

    async fn send(&self, families: &[MetricFamily]) -> Result<(), SinkError>;
}
