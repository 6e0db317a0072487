//! End-to-end scrape cycles against in-process fake brokers.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use kmon::pool::BlockingPool;
use kmon::sink::{MetricsSink, RecordProducer, SinkFanOut, TopicRecord, TopicSink};
use kmon::{ClusterCollector, ClusterDescription, Node, ScrapeConfig, Scraper, SinkError};
use kmon_core::exposition::write_exposition;
use kmon_metrics::{expose_clusters, MetricsStore};
use kmon_types::MetricFamily;
use std::sync::{Arc, Mutex};

const BROKER_BODY: &str = "\
# HELP kafka_server_replicamanager_leadercount Leader partitions
# TYPE kafka_server_replicamanager_leadercount gauge
kafka_server_replicamanager_leadercount 4
# TYPE kafka_server_brokertopicmetrics_fifteenminuterate gauge
kafka_server_brokertopicmetrics_fifteenminuterate{name=\"BytesInPerSec\"} 1024
kafka_server_brokertopicmetrics_fifteenminuterate{name=\"BytesInPerSec\",topic=\"orders\"} 512
this line is not exposition text
# TYPE requests counter
requests_total{api=\"produce\"} 10
";

async fn serve(router: Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    port
}

async fn healthy_broker() -> u16 {
    serve(Router::new().route("/metrics", get(|| async { BROKER_BODY }))).await
}

async fn failing_broker() -> u16 {
    serve(Router::new().route(
        "/metrics",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "down") }),
    ))
    .await
}

async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[derive(Default, Clone)]
struct Recorder {
    sent: Arc<Mutex<Vec<String>>>,
}

impl RecordProducer for Recorder {
    fn produce(&self, _: &str, payload: String) -> Result<(), SinkError> {
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }
}

#[derive(Default, Clone)]
struct Capture {
    batches: Arc<Mutex<Vec<Vec<MetricFamily>>>>,
}

#[async_trait]
impl MetricsSink for Capture {
    fn name(&self) -> &'static str {
        "capture"
    }

    async fn send(&self, families: &[MetricFamily]) -> Result<(), SinkError> {
        self.batches.lock().unwrap().push(families.to_vec());
        Ok(())
    }
}

fn scraper(cluster: &str) -> Scraper {
    let config = ScrapeConfig {
        timeout_secs: 2,
        ..ScrapeConfig::default()
    };
    Scraper::for_config(cluster, &config, BlockingPool::new(2)).unwrap()
}

#[tokio::test]
async fn cycle_survives_failing_brokers() {
    let nodes = vec![
        Node::new(1, "127.0.0.1").with_port(healthy_broker().await),
        Node::new(2, "127.0.0.1").with_port(failing_broker().await),
        Node::new(3, "127.0.0.1").with_port(closed_port().await),
        Node::new(4, "127.0.0.1").with_port(healthy_broker().await),
    ];
    let description = ClusterDescription::new("A", nodes).with_controller(1);

    let store = MetricsStore::new();
    let collector = ClusterCollector::new(scraper("A"), store.clone(), Arc::new(SinkFanOut::default()));
    assert!(collector.run_cycle(&description).await.is_none());

    let metrics = store.get("A").await.unwrap();
    let reporting: Vec<_> = metrics.per_broker().keys().copied().collect();
    assert_eq!(reporting, vec![1, 4]);

    let families = &metrics.per_broker()[&1];
    let names: Vec<_> = families.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "kafka_server_replicamanager_leadercount",
            "kafka_server_brokertopicmetrics_fifteenminuterate",
            "requests",
        ]
    );

    assert_eq!(metrics.io_rates().broker_bytes_in.get(&1), Some(&1024.0));
    assert_eq!(metrics.io_rates().topic_bytes_in.get("orders"), Some(&1024.0));

    let text = expose_clusters(&store.snapshot().await);
    assert!(text.contains("broker_count{cluster=\"A\"} 4\n"));
    assert!(text.contains("broker_controller_id{cluster=\"A\"} 1\n"));
    assert!(text.contains("kafka_server_replicamanager_leadercount{cluster=\"A\",broker_id=\"1\"} 4\n"));
    assert!(text.contains("kafka_server_replicamanager_leadercount{cluster=\"A\",broker_id=\"4\"} 4\n"));
    assert!(text.contains("requests_total{cluster=\"A\",broker_id=\"4\",api=\"produce\"} 10\n"));
    assert_eq!(text.matches("# TYPE requests counter").count(), 1);
}

#[tokio::test]
async fn cycle_replaces_previous_snapshot() {
    let description = ClusterDescription::new(
        "B",
        vec![Node::new(1, "127.0.0.1").with_port(healthy_broker().await)],
    );
    let store = MetricsStore::new();
    let collector = ClusterCollector::new(scraper("B"), store.clone(), Arc::new(SinkFanOut::default()));

    collector.run_cycle(&description).await;
    let first = store.get("B").await.unwrap();
    collector.run_cycle(&description).await;
    let second = store.get("B").await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.per_broker().len(), 1);
}

#[tokio::test]
async fn cycle_delivers_labeled_families_to_sinks() {
    let description = ClusterDescription::new(
        "C",
        vec![Node::new(7, "127.0.0.1").with_port(healthy_broker().await)],
    );
    let recorder = Recorder::default();
    let topic: Arc<dyn MetricsSink> = Arc::new(TopicSink::new(recorder.clone(), "metrics").unwrap());
    let collector = ClusterCollector::new(
        scraper("C"),
        MetricsStore::new(),
        Arc::new(SinkFanOut::new(vec![topic])),
    );

    let delivery = collector.run_cycle(&description).await.unwrap();
    delivery.await.unwrap();

    let records: Vec<TopicRecord> = recorder
        .sent
        .lock()
        .unwrap()
        .iter()
        .map(|payload| serde_json::from_str(payload).unwrap())
        .collect();

    let leader = records
        .iter()
        .find(|r| r.name == "kafka_server_replicamanager_leadercount")
        .unwrap();
    assert_eq!(leader.value, "4");
    assert_eq!(leader.labels["cluster"], "C");
    assert_eq!(leader.labels["broker_id"], "7");

    let count = records.iter().find(|r| r.name == "broker_count").unwrap();
    assert_eq!(count.labels["cluster"], "C");
    assert!(count.labels.get("broker_id").is_none());
}

#[tokio::test]
async fn unknown_route_counts_as_failure() {
    let port = serve(Router::new().route("/other", post(|| async { "" }))).await;
    let description = ClusterDescription::new("D", vec![Node::new(1, "127.0.0.1").with_port(port)]);
    let store = MetricsStore::new();
    let collector = ClusterCollector::new(scraper("D"), store.clone(), Arc::new(SinkFanOut::default()));

    collector.run_cycle(&description).await;
    assert!(store.get("D").await.unwrap().per_broker().is_empty());
}

#[tokio::test]
async fn sinks_see_one_family_per_name() {
    let description = ClusterDescription::new(
        "E",
        vec![
            Node::new(1, "127.0.0.1").with_port(healthy_broker().await),
            Node::new(2, "127.0.0.1").with_port(healthy_broker().await),
        ],
    );
    let capture = Capture::default();
    let sink: Arc<dyn MetricsSink> = Arc::new(capture.clone());
    let collector = ClusterCollector::new(
        scraper("E"),
        MetricsStore::new(),
        Arc::new(SinkFanOut::new(vec![sink])),
    );

    collector.run_cycle(&description).await.unwrap().await.unwrap();

    let batches = capture.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    let families = &batches[0];
    let mut names: Vec<_> = families.iter().map(|f| f.name.as_str()).collect();
    let total = names.len();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), total);

    let leader = families
        .iter()
        .find(|f| f.name == "kafka_server_replicamanager_leadercount")
        .unwrap();
    assert_eq!(leader.points.len(), 2);

    let text = write_exposition(families);
    assert_eq!(text.matches("# TYPE requests counter").count(), 1);
}
