use thiserror::Error;

/// Failures of the bounded blocking worker pool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Blocking pool is closed")]
    Closed,

    #[error("Blocking task panicked: {0}")]
    Panicked(String),
}

/// Failure to retrieve metrics from one broker.
///
/// Never fatal: the scraper logs it and the broker contributes no data for
/// the cycle.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Broker responded with status {0}")]
    Status(u16),

    #[error("Authentication rejected by {0}")]
    Unauthorized(String),

    #[error("Management protocol error: {0}")]
    Protocol(String),

    #[error("Invalid TLS material: {0}")]
    TlsMaterial(String),

    #[error("Secure transport is not supported by this build")]
    UnsupportedCapability,

    #[error("Worker error: {0}")]
    Worker(#[from] PoolError),
}

/// Delivery failure local to one sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Producer rejected records: {0}")]
    Producer(String),

    #[error("Worker error: {0}")]
    Worker(#[from] PoolError),
}

/// Invalid or unreadable configuration, reported at construction time
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("{sink} sink: {reason}")]
    Sink { sink: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn sink(sink: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Sink {
            sink,
            reason: reason.into(),
        }
    }
}
