//! Remote-management retrieval.
//!
//! Each call opens its own connection to the broker's management service,
//! reads every attribute of the objects matching [`BROKER_FILTER`], flattens
//! them into raw observations and groups those into gauge families. The
//! connection is dropped on every exit path. Blocking work runs on the
//! [`BlockingPool`].
//!
//! The shipped [`JolokiaConnector`] reaches the management service through its
//! JSON HTTP bridge. Other transports plug in through [`ManagementConnector`].

use async_trait::async_trait;
use dashmap::DashMap;
use kmon_types::{group_into_families, Labels, MetricFamily, RawObservation};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::BrokerRetriever;
use crate::config::ScrapeConfig;
use crate::error::RetrievalError;
use crate::pool::BlockingPool;
use crate::topology::Node;

/// Object-name pattern covering the broker's server metrics
pub const BROKER_FILTER: &str = "kafka.server*:*";

/// Whether this build can open secure management connections.
pub fn tls_supported() -> bool {
    cfg!(feature = "management-tls")
}

/// Everything one connection attempt needs, scoped to that attempt.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub host: String,
    pub port: u16,
    pub tls_enabled: bool,
    pub credentials: Option<(String, String)>,
    pub keystore: Option<PathBuf>,
    pub truststore: Option<PathBuf>,
    pub timeout: Duration,
}

impl ConnectionContext {
    pub fn for_node(node: &Node, config: &ScrapeConfig) -> Self {
        Self {
            host: node.host.clone(),
            port: node.port_or(config.port),
            tls_enabled: config.tls_enabled,
            credentials: config.credentials(),
            keystore: config.keystore.clone(),
            truststore: config.truststore.clone(),
            timeout: config.timeout(),
        }
    }

    /// Address of the management service, for logs.
    pub fn service_url(&self) -> String {
        format!(
            "service:jmx:rmi:///jndi/rmi://{}:{}/jmxrmi",
            self.host, self.port
        )
    }

    /// Address of the JSON bridge fronting the management service.
    pub fn bridge_url(&self) -> String {
        let scheme = if self.tls_enabled { "https" } else { "http" };
        format!("{}://{}:{}/jolokia/", scheme, self.host, self.port)
    }

    fn client_key(&self) -> ClientKey {
        ClientKey {
            tls_enabled: self.tls_enabled,
            keystore: self.keystore.clone(),
            truststore: self.truststore.clone(),
            timeout: self.timeout,
        }
    }
}

/// One managed object and its attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedObject {
    /// Object name, `domain:key=value,...`
    pub name: String,
    pub attributes: Vec<(String, Value)>,
}

/// An open management connection. Dropping it releases the connection.
pub trait ManagementConnection {
    fn query(&mut self, filter: &str) -> Result<Vec<ManagedObject>, RetrievalError>;
}

/// Opens management connections. Called from blocking worker threads.
pub trait ManagementConnector: Send + Sync + 'static {
    type Connection: ManagementConnection;

    fn connect(&self, context: &ConnectionContext) -> Result<Self::Connection, RetrievalError>;

    /// Drop cached process-wide state.
    fn shutdown(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    tls_enabled: bool,
    keystore: Option<PathBuf>,
    truststore: Option<PathBuf>,
    timeout: Duration,
}

/// HTTP clients keyed by their TLS material, shared across connections.
///
/// Only the configured client is cached. Clients keep no idle sockets, so each
/// connection's socket is closed once its call completes.
#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<ClientKey, reqwest::blocking::Client>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_build(
        &self,
        context: &ConnectionContext,
    ) -> Result<reqwest::blocking::Client, RetrievalError> {
        let key = context.client_key();
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let builder = reqwest::blocking::Client::builder()
            .timeout(key.timeout)
            .pool_max_idle_per_host(0);
        let client = apply_tls(builder, &key)?.build()?;
        self.clients.insert(key, client.clone());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clear(&self) {
        self.clients.clear();
    }
}

#[cfg(feature = "management-tls")]
fn apply_tls(
    mut builder: reqwest::blocking::ClientBuilder,
    key: &ClientKey,
) -> Result<reqwest::blocking::ClientBuilder, RetrievalError> {
    if !key.tls_enabled {
        return Ok(builder);
    }
    if let Some(path) = &key.truststore {
        let pem = read_pem(path)?;
        builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
    }
    if let Some(path) = &key.keystore {
        let pem = read_pem(path)?;
        builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
    }
    Ok(builder)
}

#[cfg(not(feature = "management-tls"))]
fn apply_tls(
    builder: reqwest::blocking::ClientBuilder,
    key: &ClientKey,
) -> Result<reqwest::blocking::ClientBuilder, RetrievalError> {
    if key.tls_enabled {
        return Err(RetrievalError::UnsupportedCapability);
    }
    Ok(builder)
}

#[cfg(feature = "management-tls")]
fn read_pem(path: &std::path::Path) -> Result<Vec<u8>, RetrievalError> {
    std::fs::read(path)
        .map_err(|e| RetrievalError::TlsMaterial(format!("{}: {}", path.display(), e)))
}

/// Connector speaking the Jolokia JSON bridge protocol.
#[derive(Default)]
pub struct JolokiaConnector {
    registry: ClientRegistry,
}

impl JolokiaConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }
}

impl ManagementConnector for JolokiaConnector {
    type Connection = JolokiaConnection;

    fn connect(&self, context: &ConnectionContext) -> Result<JolokiaConnection, RetrievalError> {
        let client = self.registry.get_or_build(context)?;
        trace!(service = %context.service_url(), "opened management connection");
        Ok(JolokiaConnection {
            client,
            url: context.bridge_url(),
            service: context.service_url(),
            credentials: context.credentials.clone(),
        })
    }

    fn shutdown(&self) {
        debug!(clients = self.registry.len(), "clearing management client registry");
        self.registry.clear();
    }
}

pub struct JolokiaConnection {
    client: reqwest::blocking::Client,
    url: String,
    service: String,
    credentials: Option<(String, String)>,
}

#[derive(Deserialize)]
struct ReadResponse {
    status: u16,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

impl ManagementConnection for JolokiaConnection {
    fn query(&mut self, filter: &str) -> Result<Vec<ManagedObject>, RetrievalError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "type": "read", "mbean": filter }));
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send()?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(RetrievalError::Unauthorized(self.service.clone()));
        }
        if !status.is_success() {
            return Err(RetrievalError::Status(status.as_u16()));
        }

        let body: ReadResponse = response.json()?;
        if body.status != 200 {
            return Err(RetrievalError::Protocol(body.error.unwrap_or_else(|| {
                format!("read request failed with status {}", body.status)
            })));
        }

        let Value::Object(objects) = body.value else {
            return Err(RetrievalError::Protocol(
                "read response value is not an object map".to_string(),
            ));
        };

        Ok(objects
            .into_iter()
            .filter_map(|(name, attributes)| match attributes {
                Value::Object(attributes) => Some(ManagedObject {
                    name,
                    attributes: attributes.into_iter().collect(),
                }),
                _ => None,
            })
            .collect())
    }
}

impl Drop for JolokiaConnection {
    fn drop(&mut self) {
        trace!(service = %self.service, "released management connection");
    }
}

fn fix(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Flatten one managed object into raw observations.
///
/// The name is `<domain>_<type>_<attribute>` with `.` and `-` mapped to `_`;
/// the remaining key properties become labels in declaration order. Composite
/// attributes extend the name with `_<key>`, tabular ones add a `row` label.
/// Booleans become 1/0; strings and nulls are skipped.
pub fn flatten(object: &ManagedObject) -> Vec<RawObservation> {
    let Some((domain, properties)) = object.name.split_once(':') else {
        return Vec::new();
    };

    let mut kind = None;
    let mut labels = Labels::new();
    for property in properties.split(',') {
        let Some((key, value)) = property.split_once('=') else {
            continue;
        };
        if key == "type" {
            kind = Some(value);
        } else {
            labels.insert(fix(key), value.trim_matches('"'));
        }
    }

    let prefix = match kind {
        Some(kind) => format!("{}_{}", fix(domain), fix(kind)),
        None => fix(domain),
    };

    let mut out = Vec::new();
    for (attribute, value) in &object.attributes {
        flatten_value(&format!("{}_{}", prefix, fix(attribute)), &labels, value, &mut out);
    }
    out
}

fn flatten_value(name: &str, labels: &Labels, value: &Value, out: &mut Vec<RawObservation>) {
    match value {
        Value::Number(number) => {
            if let Some(v) = number.as_f64() {
                out.push(RawObservation::new(name, labels.clone(), v));
            }
        }
        Value::Bool(flag) => {
            out.push(RawObservation::new(
                name,
                labels.clone(),
                if *flag { 1.0 } else { 0.0 },
            ));
        }
        Value::Object(fields) => {
            for (key, field) in fields {
                flatten_value(&format!("{}_{}", name, fix(key)), labels, field, out);
            }
        }
        Value::Array(rows) => {
            for (row, entry) in rows.iter().enumerate() {
                let row_labels = labels.clone().with("row", row.to_string());
                flatten_value(name, &row_labels, entry, out);
            }
        }
        Value::String(_) | Value::Null => {}
    }
}

/// Retriever over the remote-management protocol.
pub struct ManagementRetriever<C: ManagementConnector = JolokiaConnector> {
    connector: Arc<C>,
    pool: BlockingPool,
    config: ScrapeConfig,
    tls_supported: bool,
    warned_unsupported: AtomicBool,
}

impl ManagementRetriever<JolokiaConnector> {
    pub fn new(config: ScrapeConfig, pool: BlockingPool) -> Self {
        Self::with_connector(JolokiaConnector::new(), config, pool)
    }
}

impl<C: ManagementConnector> ManagementRetriever<C> {
    pub fn with_connector(connector: C, config: ScrapeConfig, pool: BlockingPool) -> Self {
        Self {
            connector: Arc::new(connector),
            pool,
            config,
            tls_supported: tls_supported(),
            warned_unsupported: AtomicBool::new(false),
        }
    }

    /// Override the secure-transport capability detected at construction.
    pub fn with_tls_support(mut self, supported: bool) -> Self {
        self.tls_supported = supported;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

#[async_trait]
impl<C: ManagementConnector> BrokerRetriever for ManagementRetriever<C> {
    async fn retrieve(&self, node: &Node) -> Result<Vec<MetricFamily>, RetrievalError> {
        if self.config.tls_enabled && !self.tls_supported {
            if !self.warned_unsupported.swap(true, Ordering::Relaxed) {
                warn!(
                    broker_id = node.id,
                    "secure management transport requested but not built in, skipping management scrapes"
                );
            }
            return Ok(Vec::new());
        }

        let context = ConnectionContext::for_node(node, &self.config);
        let connector = self.connector.clone();
        let objects = self
            .pool
            .run(move || -> Result<Vec<ManagedObject>, RetrievalError> {
                let mut connection = connector.connect(&context)?;
                connection.query(BROKER_FILTER)
            })
            .await??;

        let families: Vec<MetricFamily> =
            group_into_families(objects.iter().flat_map(flatten)).collect();
        debug!(
            broker_id = node.id,
            objects = objects.len(),
            families = families.len(),
            "retrieved management metrics"
        );
        Ok(families)
    }

    fn method(&self) -> &'static str {
        "management"
    }

    fn shutdown(&self) {
        self.connector.shutdown();
    }
}
