//! Shared utilities for integration tests: mock subgraphs and a gateway harness.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::{connect_info::MockConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

use federation_gateway::config::{GatewayConfig, SubgraphConfig};
use federation_gateway::http::{build_router, AppState};
use federation_gateway::lifecycle::build_gateway;

pub const CLIENT_ADDR: ([u8; 4], u16) = ([1, 2, 3, 4], 40_000);

/// One call received by a mock subgraph.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    schema: Value,
    response: Value,
    calls: Arc<Mutex<Vec<Recorded>>>,
    healthy: Arc<AtomicBool>,
}

/// A running axum subgraph on an ephemeral port.
pub struct MockSubgraph {
    pub name: String,
    pub url: String,
    calls: Arc<Mutex<Vec<Recorded>>>,
    healthy: Arc<AtomicBool>,
}

impl MockSubgraph {
    pub fn config(&self) -> SubgraphConfig {
        SubgraphConfig {
            name: self.name.clone(),
            url: self.url.clone(),
        }
    }

    /// While unhealthy every call, probes included, gets a 503.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Calls other than the gateway's introspection probe.
    pub fn operations(&self) -> Vec<Recorded> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.body["operationName"] != "GatewayProbe")
            .cloned()
            .collect()
    }
}

/// Root field of a mock schema: `(name, returns_list)`.
pub type RootField = (&'static str, bool);

/// Start a subgraph whose `Query` declares `query_fields` and `Mutation` declares
/// `mutation_fields`. Every non-probe operation is answered with `response`.
pub async fn spawn_subgraph(
    name: &str,
    query_fields: &[RootField],
    mutation_fields: &[RootField],
    response: Value,
) -> MockSubgraph {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let healthy = Arc::new(AtomicBool::new(true));
    let state = MockState {
        schema: introspection(query_fields, mutation_fields),
        response,
        calls: calls.clone(),
        healthy: healthy.clone(),
    };

    let app = Router::new()
        .route("/graphql", post(mock_handler))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockSubgraph {
        name: name.to_string(),
        url: format!("http://{}/graphql", addr),
        calls,
        healthy,
    }
}

async fn mock_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let is_probe = body["operationName"] == "GatewayProbe";
    state.calls.lock().unwrap().push(Recorded { headers, body });
    if !state.healthy.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "upstream connect error").into_response();
    }
    if is_probe {
        Json(json!({ "data": { "__schema": state.schema } })).into_response()
    } else {
        Json(state.response.clone()).into_response()
    }
}

fn introspection(query_fields: &[RootField], mutation_fields: &[RootField]) -> Value {
    let field = |(name, list): &RootField| {
        let item = json!({ "kind": "OBJECT", "name": "Item", "ofType": null });
        let ty = if *list {
            json!({ "kind": "LIST", "name": null, "ofType": item })
        } else {
            item
        };
        json!({ "name": name, "args": [], "type": ty, "isDeprecated": false })
    };

    let mut types = vec![
        json!({ "kind": "OBJECT", "name": "Query", "fields": query_fields.iter().map(field).collect::<Vec<_>>() }),
        json!({ "kind": "OBJECT", "name": "Item", "fields": [
            { "name": "id", "args": [], "type": { "kind": "SCALAR", "name": "ID", "ofType": null }, "isDeprecated": false }
        ]}),
    ];
    let mutation_type = if mutation_fields.is_empty() {
        Value::Null
    } else {
        types.push(json!({
            "kind": "OBJECT",
            "name": "Mutation",
            "fields": mutation_fields.iter().map(field).collect::<Vec<_>>()
        }));
        json!({ "name": "Mutation" })
    };

    json!({
        "queryType": { "name": "Query" },
        "mutationType": mutation_type,
        "types": types,
        "directives": [],
    })
}

/// URL of a port nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/graphql", addr)
}

/// Defaults tuned for tests: short probe timeout, no background re-probing.
pub fn test_config(subgraphs: Vec<SubgraphConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.subgraphs = subgraphs;
    config.probe.timeout_ms = 1_000;
    config.probe.reprobe_enabled = false;
    config.timeouts.subgraph_ms = 2_000;
    config.observability.metrics_enabled = false;
    config
}

pub async fn gateway(config: GatewayConfig) -> AppState {
    build_gateway(config).await.unwrap()
}

/// Router with a fixed client address, for `oneshot` tests.
pub fn router(state: AppState) -> Router {
    build_router(state, Duration::from_secs(10))
        .layer(MockConnectInfo(SocketAddr::from(CLIENT_ADDR)))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn graphql_request(body: Value) -> Request<Body> {
    Request::post("/graphql")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn post_graphql(router: &Router, query: &str) -> TestResponse {
    send(router, graphql_request(json!({ "query": query }))).await
}

/// First error code of a response.
pub fn error_code(body: &Value) -> Option<&str> {
    body["errors"][0]["extensions"]["code"].as_str()
}
