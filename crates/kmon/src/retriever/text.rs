//! Exposition text endpoint retrieval.

use async_trait::async_trait;
use kmon_core::exposition::ExpositionParser;
use kmon_metrics::exporter;
use kmon_types::MetricFamily;
use tracing::debug;

use super::BrokerRetriever;
use crate::config::ScrapeConfig;
use crate::error::RetrievalError;
use crate::topology::Node;

/// GETs each broker's metrics endpoint and parses the body.
pub struct TextRetriever {
    client: reqwest::Client,
    config: ScrapeConfig,
}

impl TextRetriever {
    pub fn new(config: ScrapeConfig) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn url(&self, node: &Node) -> String {
        format!(
            "{}://{}:{}{}",
            self.config.scheme(),
            node.host,
            node.port_or(self.config.port),
            self.config.metrics_path
        )
    }
}

#[async_trait]
impl BrokerRetriever for TextRetriever {
    async fn retrieve(&self, node: &Node) -> Result<Vec<MetricFamily>, RetrievalError> {
        let url = self.url(node);
        let mut request = self.client.get(&url);
        if let Some((user, password)) = self.config.credentials() {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Status(status.as_u16()));
        }
        let body = response.text().await?;

        let mut parser = ExpositionParser::new();
        parser.feed_lines(body.lines());
        let outcome = parser.finish();
        if outcome.skipped_lines > 0 {
            exporter::add_skipped_lines(outcome.skipped_lines);
            debug!(broker_id = node.id, skipped = outcome.skipped_lines, "skipped unparsable lines");
        }
        debug!(
            broker_id = node.id,
            families = outcome.families.len(),
            "retrieved text metrics"
        );
        Ok(outcome.families)
    }

    fn method(&self) -> &'static str {
        "text"
    }
}
