//! The engine's own operational metrics.

use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, Encoder,
    HistogramVec, IntCounter, TextEncoder,
};

lazy_static::lazy_static! {
    /// Scrape cycle duration by cluster and retrieval method
    pub static ref SCRAPE_DURATION: HistogramVec = register_histogram_vec!(
        "kmon_scrape_duration_seconds",
        "Time taken to scrape every broker of a cluster",
        &["cluster", "method"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    /// Broker retrievals that failed and yielded no data
    pub static ref BROKER_SCRAPE_FAILURES: CounterVec = register_counter_vec!(
        "kmon_broker_scrape_failures_total",
        "Broker retrievals that failed and yielded no data",
        &["cluster", "method"]
    ).unwrap();

    /// Exposition lines skipped while parsing broker bodies
    pub static ref PARSE_SKIPPED_LINES: IntCounter = register_int_counter!(
        "kmon_parse_skipped_lines_total",
        "Exposition lines skipped while parsing broker bodies"
    ).unwrap();

    /// Sink deliveries by sink and result (ok, error, skipped)
    pub static ref SINK_DELIVERIES: CounterVec = register_counter_vec!(
        "kmon_sink_deliveries_total",
        "Sink deliveries by sink and result",
        &["sink", "result"]
    ).unwrap();
}

pub fn record_scrape(cluster: &str, method: &str, duration_secs: f64) {
    SCRAPE_DURATION
        .with_label_values(&[cluster, method])
        .observe(duration_secs);
}

pub fn inc_broker_failure(cluster: &str, method: &str) {
    BROKER_SCRAPE_FAILURES
        .with_label_values(&[cluster, method])
        .inc();
}

pub fn add_skipped_lines(count: usize) {
    PARSE_SKIPPED_LINES.inc_by(count as u64);
}

pub fn record_sink_delivery(sink: &str, result: &str) {
    SINK_DELIVERIES.with_label_values(&[sink, result]).inc();
}

/// Export the engine's own metrics in exposition text format
pub fn export_metrics() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
