//! Configuration for the kmon engine.
//!
//! Loaded once from a TOML file; every field has a default so a minimal file
//! only lists clusters and the sinks that should be active.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::topology::{ClusterDescription, Node, TopicDescription};

/// How broker metrics are retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeKind {
    /// Remote-management protocol, one short-lived connection per broker
    Management,
    /// HTTP endpoint serving the exposition text format
    Text,
}

impl ScrapeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeKind::Management => "management",
            ScrapeKind::Text => "text",
        }
    }
}

/// Per-cluster retrieval settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_scrape_kind")]
    pub kind: ScrapeKind,

    /// Port of the management service or the metrics endpoint
    #[serde(default = "default_scrape_port")]
    pub port: u16,

    #[serde(default)]
    pub tls_enabled: bool,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// PEM file holding the client certificate chain and private key
    #[serde(default)]
    pub keystore: Option<PathBuf>,

    /// PEM file holding the CA certificates trusted for broker connections
    #[serde(default)]
    pub truststore: Option<PathBuf>,

    /// Path of the text endpoint on each broker
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scrape_kind() -> ScrapeKind {
    ScrapeKind::Text
}

fn default_scrape_port() -> u16 {
    9404
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            kind: default_scrape_kind(),
            port: default_scrape_port(),
            tls_enabled: false,
            username: None,
            password: None,
            keystore: None,
            truststore: None,
            metrics_path: default_metrics_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ScrapeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls_enabled {
            "https"
        } else {
            "http"
        }
    }

    /// Username/password pair when authentication is configured.
    pub fn credentials(&self) -> Option<(String, String)> {
        self.username
            .as_ref()
            .map(|user| (user.clone(), self.password.clone().unwrap_or_default()))
    }

    fn validate(&self, cluster: &str) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid(format!(
                "cluster {}: scrape port must be non-zero",
                cluster
            )));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::Invalid(format!(
                "cluster {}: password given without username",
                cluster
            )));
        }
        if !self.metrics_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "cluster {}: metrics_path must start with '/'",
                cluster
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(format!(
                "cluster {}: timeout_secs must be positive",
                cluster
            )));
        }
        Ok(())
    }
}

/// One monitored cluster with its statically known topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub controller: Option<i32>,

    #[serde(default)]
    pub topics: Vec<TopicDescription>,
}

impl ClusterConfig {
    pub fn description(&self) -> ClusterDescription {
        ClusterDescription {
            name: self.name.clone(),
            nodes: self.nodes.clone(),
            controller: self.controller,
            topics: self.topics.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSinkConfig {
    pub bootstrap_servers: String,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushGatewayConfig {
    pub url: String,

    #[serde(default = "default_job")]
    pub job: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

fn default_job() -> String {
    "kmon".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteWriteConfig {
    /// Base URL; requests go to `<url>/api/v1/write`
    pub url: String,

    #[serde(default)]
    pub tls_enabled: bool,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Outbound delivery targets; each one is optional and all may be active
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub topic: Option<TopicSinkConfig>,

    #[serde(default)]
    pub push_gateway: Option<PushGatewayConfig>,

    #[serde(default)]
    pub remote_write: Option<RemoteWriteConfig>,
}

/// Top-level configuration of the `kmon-server` binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmonConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    #[serde(default = "default_scrape_interval_secs")]
    pub scrape_interval_secs: u64,

    /// Maximum number of concurrent blocking calls
    #[serde(default = "default_blocking_pool_size")]
    pub blocking_pool_size: usize,

    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,

    #[serde(default)]
    pub sinks: SinkConfig,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9308))
}

fn default_scrape_interval_secs() -> u64 {
    30
}

fn default_blocking_pool_size() -> usize {
    8
}

impl Default for KmonConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            scrape_interval_secs: default_scrape_interval_secs(),
            blocking_pool_size: default_blocking_pool_size(),
            clusters: Vec::new(),
            sinks: SinkConfig::default(),
        }
    }
}

impl KmonConfig {
    /// Read, parse and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: KmonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scrape_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "scrape_interval_secs must be positive".to_string(),
            ));
        }
        if self.blocking_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "blocking_pool_size must be positive".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for cluster in &self.clusters {
            if cluster.name.trim().is_empty() {
                return Err(ConfigError::Invalid("cluster name must not be empty".to_string()));
            }
            if !names.insert(cluster.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate cluster name: {}",
                    cluster.name
                )));
            }

            let mut ids = HashSet::new();
            for node in &cluster.nodes {
                if !ids.insert(node.id) {
                    return Err(ConfigError::Invalid(format!(
                        "cluster {}: duplicate broker id {}",
                        cluster.name, node.id
                    )));
                }
            }
            cluster.scrape.validate(&cluster.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
listen_addr = "127.0.0.1:9999"
scrape_interval_secs = 15

[[clusters]]
name = "prod"
controller = 1

[clusters.scrape]
kind = "management"
port = 9999
username = "monitor"
password = "secret"

[[clusters.nodes]]
id = 1
host = "broker-1"

[[clusters.nodes]]
id = 2
host = "broker-2"

[[clusters.topics]]
name = "orders"

[[clusters.topics.partitions]]
id = 0
leader = 1
replicas = [1, 2]
isr = [1]

[sinks.push_gateway]
url = "http://gateway:9091"
"#;

    #[test]
    fn test_defaults() {
        let config = KmonConfig::from_toml_str("").unwrap();
        assert_eq!(config.listen_addr.port(), 9308);
        assert_eq!(config.scrape_interval(), Duration::from_secs(30));
        assert_eq!(config.blocking_pool_size, 8);
        assert!(config.clusters.is_empty());
        assert_eq!(config.sinks, SinkConfig::default());
    }

    #[test]
    fn test_full_file() {
        let config = KmonConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.scrape_interval_secs, 15);

        let cluster = &config.clusters[0];
        assert_eq!(cluster.scrape.kind, ScrapeKind::Management);
        assert_eq!(cluster.scrape.metrics_path, "/metrics");
        assert_eq!(
            cluster.scrape.credentials(),
            Some(("monitor".to_string(), "secret".to_string()))
        );

        let description = cluster.description();
        assert_eq!(description.nodes.len(), 2);
        assert_eq!(description.controller, Some(1));
        assert!(description.topics[0].partitions[0].is_under_replicated());

        let gateway = config.sinks.push_gateway.as_ref().unwrap();
        assert_eq!(gateway.job, "kmon");
        assert!(config.sinks.topic.is_none());
    }

    #[test]
    fn test_rejects_duplicate_broker_ids() {
        let text = r#"
[[clusters]]
name = "a"
nodes = [{ id = 1, host = "x" }, { id = 1, host = "y" }]
"#;
        let err = KmonConfig::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("duplicate broker id 1"));
    }

    #[test]
    fn test_rejects_duplicate_cluster_names() {
        let text = r#"
[[clusters]]
name = "a"

[[clusters]]
name = "a"
"#;
        assert!(matches!(
            KmonConfig::from_toml_str(text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_password_without_username() {
        let mut config = KmonConfig::default();
        config.clusters.push(ClusterConfig {
            name: "a".to_string(),
            scrape: ScrapeConfig {
                password: Some("x".to_string()),
                ..ScrapeConfig::default()
            },
            nodes: Vec::new(),
            controller: None,
            topics: Vec::new(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(matches!(
            KmonConfig::from_toml_str("scrape_interval_secs = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kmon.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = KmonConfig::load(&path).unwrap();
        assert_eq!(config.clusters[0].name, "prod");

        assert!(matches!(
            KmonConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
