//! Per-broker metric retrieval.

pub mod management;
pub mod text;

use async_trait::async_trait;
use kmon_types::MetricFamily;

use crate::error::RetrievalError;
use crate::topology::Node;

pub use management::{
    flatten, ClientRegistry, ConnectionContext, JolokiaConnector, ManagedObject,
    ManagementConnection, ManagementConnector, ManagementRetriever, BROKER_FILTER,
};
pub use text::TextRetriever;

/// Fetches the metric families of one broker.
///
/// An error covers only the broker it was returned for; the scraper turns it
/// into a missing entry and keeps going.
#[async_trait]
pub trait BrokerRetriever: Send + Sync + 'static {
    async fn retrieve(&self, node: &Node) -> Result<Vec<MetricFamily>, RetrievalError>;

    /// Label used for this retrieval method in logs and self metrics.
    fn method(&self) -> &'static str;

    /// Release process-wide resources held by the retriever.
    fn shutdown(&self) {}
}
