//! Management retrieval through a fake JSON bridge.

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use kmon::pool::BlockingPool;
use kmon::retriever::{BrokerRetriever, ManagementRetriever, BROKER_FILTER};
use kmon::{Node, RetrievalError, ScrapeConfig};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

async fn serve(router: Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    port
}

async fn bridge(headers: HeaderMap, Json(request): Json<Value>) -> impl IntoResponse {
    if !headers.contains_key("authorization") {
        return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
    }
    assert_eq!(request["type"], "read");
    assert_eq!(request["mbean"], BROKER_FILTER);

    Json(json!({
        "status": 200,
        "value": {
            "kafka.server:type=ReplicaManager,name=LeaderCount": { "Value": 12 },
            "kafka.server:type=BrokerTopicMetrics,name=BytesInPerSec,topic=orders": {
                "FifteenMinuteRate": 2.5,
                "RateUnit": "SECONDS"
            },
            "kafka.server:type=BrokerTopicMetrics,name=BytesInPerSec,topic=payments": {
                "FifteenMinuteRate": 1.5
            },
            "kafka.server:type=app-info,id=1": { "Started": true }
        }
    }))
    .into_response()
}

fn config(port: u16, with_credentials: bool) -> ScrapeConfig {
    ScrapeConfig {
        kind: kmon::ScrapeKind::Management,
        port,
        username: with_credentials.then(|| "monitor".to_string()),
        password: with_credentials.then(|| "secret".to_string()),
        timeout_secs: 2,
        ..ScrapeConfig::default()
    }
}

#[tokio::test]
async fn reads_and_flattens_broker_objects() {
    let port = serve(Router::new().route("/jolokia/", post(bridge))).await;
    let retriever = ManagementRetriever::new(config(port, true), BlockingPool::new(2));

    let families = retriever.retrieve(&Node::new(1, "127.0.0.1")).await.unwrap();
    let names: Vec<_> = families.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "kafka_server_ReplicaManager_Value",
            "kafka_server_BrokerTopicMetrics_FifteenMinuteRate",
            "kafka_server_app_info_Started",
        ]
    );
    assert_eq!(families[0].points[0].value, 12.0);
    assert_eq!(families[1].points.len(), 2);
    assert_eq!(families[1].points[1].labels.get("topic"), Some("payments"));
    assert_eq!(families[2].points[0].value, 1.0);

    assert_eq!(retriever.connector().registry().len(), 1);
    retriever.shutdown();
    assert!(retriever.connector().registry().is_empty());
}

#[tokio::test]
async fn rejected_credentials_fail_only_that_call() {
    let port = serve(Router::new().route("/jolokia/", post(bridge))).await;
    let retriever = ManagementRetriever::new(config(port, false), BlockingPool::new(1));

    let result = retriever.retrieve(&Node::new(1, "127.0.0.1")).await;
    assert!(matches!(result, Err(RetrievalError::Unauthorized(_))));
}

#[tokio::test]
async fn bridge_error_status_is_a_protocol_error() {
    let router = Router::new().route(
        "/jolokia/",
        post(|| async { Json(json!({ "status": 404, "error": "no such mbean" })) }),
    );
    let port = serve(router).await;
    let retriever = ManagementRetriever::new(config(port, false), BlockingPool::new(1));

    match retriever.retrieve(&Node::new(1, "127.0.0.1")).await {
        Err(RetrievalError::Protocol(message)) => assert_eq!(message, "no such mbean"),
        other => panic!("unexpected result: {:?}", other.map(|f| f.len())),
    }
}

#[tokio::test]
async fn every_call_opens_a_fresh_connection() {
    let peers: Arc<Mutex<Vec<SocketAddr>>> = Arc::default();
    let router = Router::new()
        .route(
            "/jolokia/",
            post(
                |State(peers): State<Arc<Mutex<Vec<SocketAddr>>>>,
                 ConnectInfo(peer): ConnectInfo<SocketAddr>| async move {
                    peers.lock().unwrap().push(peer);
                    Json(json!({ "status": 200, "value": {} }))
                },
            ),
        )
        .with_state(peers.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let retriever = ManagementRetriever::new(config(port, true), BlockingPool::new(1));
    let node = Node::new(1, "127.0.0.1");
    for _ in 0..3 {
        assert!(retriever.retrieve(&node).await.unwrap().is_empty());
    }

    let peers = peers.lock().unwrap();
    assert_eq!(peers.len(), 3);
    assert_ne!(peers[0], peers[1]);
    assert_ne!(peers[1], peers[2]);
    assert_eq!(retriever.connector().registry().len(), 1);
}
