//! Remote-write sink: snappy-compressed protobuf over HTTP.

use async_trait::async_trait;
use kmon_core::exposition::escape_label_value;
use kmon_proto::{Label, Sample, TimeSeries, WriteRequest, REMOTE_WRITE_VERSION};
use kmon_types::MetricFamily;
use prost::Message;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use super::MetricsSink;
use crate::config::RemoteWriteConfig;
use crate::error::{ConfigError, SinkError};

pub const WRITE_PATH: &str = "/api/v1/write";
pub const USER_AGENT: &str = concat!("kmon/", env!("CARGO_PKG_VERSION"));

/// One series per (family, point), all sampled at `now_ms`.
///
/// Label values, `__name__` included, carry exposition escaping.
pub fn build_request(families: &[MetricFamily], now_ms: i64) -> WriteRequest {
    let timeseries = families
        .iter()
        .flat_map(|family| {
            family.points.iter().map(move |point| {
                let mut labels = Vec::with_capacity(point.labels.len() + 1);
                labels.push(Label {
                    name: "__name__".to_string(),
                    value: escape_label_value(&point.sample_name(&family.name)),
                });
                labels.extend(point.labels.iter().map(|(name, value)| Label {
                    name: name.to_string(),
                    value: escape_label_value(value),
                }));
                TimeSeries {
                    labels,
                    samples: vec![Sample {
                        value: point.value,
                        timestamp: now_ms,
                    }],
                }
            })
        })
        .collect();
    WriteRequest { timeseries }
}

/// Protobuf-encode and snappy block-compress a request.
pub fn encode_request(request: &WriteRequest) -> Result<Vec<u8>, SinkError> {
    let mut buf = Vec::with_capacity(request.encoded_len());
    request
        .encode(&mut buf)
        .map_err(|e| SinkError::Encode(e.to_string()))?;
    snap::raw::Encoder::new()
        .compress_vec(&buf)
        .map_err(|e| SinkError::Encode(e.to_string()))
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub struct RemoteWriteSink {
    client: reqwest::Client,
    endpoint: String,
    credentials: Option<(String, String)>,
}

impl RemoteWriteSink {
    pub fn new(config: &RemoteWriteConfig) -> Result<Self, ConfigError> {
        let url = config.url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(ConfigError::sink("remote_write", "url must not be empty"));
        }
        let scheme_ok = if config.tls_enabled {
            url.starts_with("https://")
        } else {
            url.starts_with("http://") || url.starts_with("https://")
        };
        if !scheme_ok {
            return Err(ConfigError::sink(
                "remote_write",
                format!("unsupported url scheme: {}", url),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigError::sink("remote_write", e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", url, WRITE_PATH),
            credentials: config
                .username
                .as_ref()
                .map(|user| (user.clone(), config.password.clone().unwrap_or_default())),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MetricsSink for RemoteWriteSink {
    fn name(&self) -> &'static str {
        "remote_write"
    }

    async fn send(&self, families: &[MetricFamily]) -> Result<(), SinkError> {
        let request = build_request(families, now_ms());
        let series = request.timeseries.len();
        let body = encode_request(&request)?;

        let mut http = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/x-protobuf")
            .header(reqwest::header::CONTENT_ENCODING, "snappy")
            .header("X-Prometheus-Remote-Write-Version", REMOTE_WRITE_VERSION)
            .body(body);
        if let Some((user, password)) = &self.credentials {
            http = http.basic_auth(user, Some(password));
        }

        let response = http.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        debug!(endpoint = %self.endpoint, series, "remote write delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kmon_types::{DataPoint, Labels, MetricKind, SampleSuffix};

    #[test]
    fn test_build_request() {
        let mut gauge = MetricFamily::new("temp", MetricKind::Gauge);
        gauge.gauge_point(Labels::new().with("room", "a\"b\\c\nd"), 21.5);
        let histogram = MetricFamily::new("lat", MetricKind::Histogram).with_point(
            DataPoint::new(Labels::new(), 4.0).with_suffix(SampleSuffix::Count),
        );

        let request = build_request(&[gauge, histogram], 1_700_000_000_000);
        assert_eq!(request.timeseries.len(), 2);

        let first = &request.timeseries[0];
        assert_eq!(first.labels[0].name, "__name__");
        assert_eq!(first.labels[0].value, "temp");
        assert_eq!(first.labels[1].value, "a\\\"b\\\\c\\nd");
        assert_eq!(first.samples[0].value, 21.5);
        assert_eq!(first.samples[0].timestamp, 1_700_000_000_000);

        assert_eq!(request.timeseries[1].labels[0].value, "lat_count");
    }

    #[test]
    fn test_encoding_is_snappy_block_protobuf() {
        let mut gauge = MetricFamily::new("m", MetricKind::Gauge);
        gauge.gauge_point(Labels::new(), 1.0);
        let request = build_request(&[gauge], 5);

        let body = encode_request(&request).unwrap();
        let raw = snap::raw::Decoder::new().decompress_vec(&body).unwrap();
        assert_eq!(WriteRequest::decode(raw.as_slice()).unwrap(), request);
    }

    #[test]
    fn test_config_validation() {
        let config = |url: &str, tls_enabled| RemoteWriteConfig {
            url: url.to_string(),
            tls_enabled,
            username: None,
            password: None,
            timeout_secs: 5,
        };
        let sink = RemoteWriteSink::new(&config("http://tsdb:9090/", false)).unwrap();
        assert_eq!(sink.endpoint(), "http://tsdb:9090/api/v1/write");

        assert!(RemoteWriteSink::new(&config("", false)).is_err());
        assert!(RemoteWriteSink::new(&config("http://tsdb:9090", true)).is_err());
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("kmon/"));
    }
}
