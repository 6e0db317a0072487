//! kmon Metrics - per-cluster snapshots and multi-cluster exposition
//!
//! This crate holds the immutable per-cluster aggregate rebuilt every scrape
//! cycle, the store that swaps those snapshots, the exposer that renders them
//! for scraping, the engine's own operational metrics and the HTTP server.

pub mod cluster;
pub mod exporter;
pub mod expose;
pub mod io_rates;
pub mod server;
pub mod store;

pub use cluster::ClusterMetrics;
pub use expose::{expose_cluster, expose_clusters, group_by_name};
pub use io_rates::IoRates;
pub use server::MetricsServer;
pub use store::MetricsStore;
