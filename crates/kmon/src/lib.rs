//! kmon - broker metrics collection engine
//!
//! Scrapes every broker of a cluster concurrently, either over the
//! remote-management protocol or from an exposition text endpoint, builds an
//! immutable per-cluster snapshot, publishes it to the
//! [`MetricsStore`](kmon_metrics::MetricsStore) served over HTTP, and pushes
//! the same data to the configured sinks.
//!
//! # Example
//!
//! ```no_run
//! use kmon::{ClusterCollector, ClusterDescription, Node, Scraper, ScrapeConfig};
//! use kmon::pool::BlockingPool;
//! use kmon::sink::SinkFanOut;
//! use kmon_metrics::MetricsStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MetricsStore::new();
//! let scraper = Scraper::for_config("prod", &ScrapeConfig::default(), BlockingPool::new(4))?;
//! let collector = ClusterCollector::new(scraper, store.clone(), Arc::new(SinkFanOut::default()));
//!
//! let description = ClusterDescription::new("prod", vec![Node::new(1, "broker-1")]);
//! collector.run_cycle(&description).await;
//! assert!(store.get("prod").await.is_some());
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod inferred;
pub mod pool;
pub mod retriever;
pub mod scraper;
pub mod sink;
pub mod topology;

pub use collector::ClusterCollector;
pub use config::{ClusterConfig, KmonConfig, ScrapeConfig, ScrapeKind, SinkConfig};
pub use error::{ConfigError, PoolError, RetrievalError, SinkError};
pub use inferred::infer_families;
pub use scraper::Scraper;
pub use topology::{ClusterDescription, Node, PartitionDescription, TopicDescription};
