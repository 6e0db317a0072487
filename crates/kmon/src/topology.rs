//! Cluster topology as handed over by the discovery collaborator.

use serde::{Deserialize, Serialize};

/// One broker of a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: i32,
    pub host: String,
    /// Overrides the cluster-wide scrape port for this broker
    #[serde(default)]
    pub port: Option<u16>,
}

impl Node {
    pub fn new(id: i32, host: impl Into<String>) -> Self {
        Self {
            id,
            host: host.into(),
            port: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescription {
    pub id: i32,
    #[serde(default)]
    pub leader: Option<i32>,
    #[serde(default)]
    pub replicas: Vec<i32>,
    #[serde(default)]
    pub isr: Vec<i32>,
}

impl PartitionDescription {
    pub fn is_under_replicated(&self) -> bool {
        self.isr.len() < self.replicas.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDescription {
    pub name: String,
    #[serde(default)]
    pub partitions: Vec<PartitionDescription>,
}

/// Snapshot of a cluster's layout at the start of a scrape cycle
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterDescription {
    pub name: String,
    pub nodes: Vec<Node>,
    pub controller: Option<i32>,
    pub topics: Vec<TopicDescription>,
}

impl ClusterDescription {
    pub fn new(name: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            nodes,
            controller: None,
            topics: Vec::new(),
        }
    }

    pub fn with_controller(mut self, controller: i32) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_topic(mut self, topic: TopicDescription) -> Self {
        self.topics.push(topic);
        self
    }
}
