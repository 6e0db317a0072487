//! Push-gateway sink.

use async_trait::async_trait;
use kmon_core::exposition::{write_exposition, CONTENT_TYPE};
use kmon_types::MetricFamily;
use std::time::Duration;
use tracing::debug;

use super::MetricsSink;
use crate::config::PushGatewayConfig;
use crate::error::{ConfigError, SinkError};
use crate::pool::BlockingPool;

const PUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Pushes the whole batch as one exposition document.
///
/// The push is a blocking HTTP call made on the [`BlockingPool`]; an empty
/// batch makes no call at all.
pub struct PushGatewaySink {
    endpoint: String,
    credentials: Option<(String, String)>,
    pool: BlockingPool,
}

impl PushGatewaySink {
    pub fn new(config: &PushGatewayConfig, pool: BlockingPool) -> Result<Self, ConfigError> {
        let url = config.url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(ConfigError::sink("push_gateway", "url must not be empty"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::sink(
                "push_gateway",
                format!("url must be http or https: {}", url),
            ));
        }
        if config.job.trim().is_empty() {
            return Err(ConfigError::sink("push_gateway", "job must not be empty"));
        }

        Ok(Self {
            endpoint: format!("{}/metrics/job/{}", url, config.job),
            credentials: config
                .username
                .as_ref()
                .map(|user| (user.clone(), config.password.clone().unwrap_or_default())),
            pool,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn push(
    endpoint: &str,
    credentials: Option<&(String, String)>,
    body: String,
) -> Result<(), SinkError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(PUSH_TIMEOUT)
        .build()?;
    let mut request = client
        .post(endpoint)
        .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
        .body(body);
    if let Some((user, password)) = credentials {
        request = request.basic_auth(user, Some(password));
    }

    let response = request.send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(SinkError::Status {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        });
    }
    Ok(())
}

#[async_trait]
impl MetricsSink for PushGatewaySink {
    fn name(&self) -> &'static str {
        "push_gateway"
    }

    async fn send(&self, families: &[MetricFamily]) -> Result<(), SinkError> {
        if families.iter().all(MetricFamily::is_empty) {
            debug!("empty batch, skipping push");
            return Ok(());
        }

        let body = write_exposition(families);
        let endpoint = self.endpoint.clone();
        let credentials = self.credentials.clone();
        self.pool
            .run(move || push(&endpoint, credentials.as_ref(), body))
            .await??;
        debug!(endpoint = %self.endpoint, families = families.len(), "pushed batch");
        Ok(())
    }
}
