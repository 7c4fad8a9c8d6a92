//! Composition, partial failure, identity forwarding and the admin API.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;

use federation_gateway::admin::setup_admin_router;
use federation_gateway::config::{EnvironmentMode, SubgraphConfig};
use federation_gateway::health::HealthMonitor;
use federation_gateway::http::GatewayServer;
use federation_gateway::lifecycle::Shutdown;

mod common;
use common::{
    error_code, gateway, graphql_request, post_graphql, router, send, spawn_subgraph, test_config,
    unreachable_url,
};

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_all_subgraphs_unreachable_still_answers_health() {
    let config = test_config(vec![
        SubgraphConfig {
            name: "users".into(),
            url: unreachable_url().await,
        },
        SubgraphConfig {
            name: "bookings".into(),
            url: unreachable_url().await,
        },
    ]);
    let app = router(gateway(config).await);

    let res = post_graphql(&app, "{ health { status timestamp services { name url reachable } } }").await;
    assert_eq!(res.status, StatusCode::OK);
    let health = &res.body["data"]["health"];
    assert_eq!(health["status"], "degraded");
    assert!(health["timestamp"].is_string());
    let services = health["services"].as_array().unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(services[0]["name"], "users");
    assert!(services.iter().all(|s| s["reachable"] == false));

    let res = send(&app, get("/health")).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body["status"], "degraded");
}

#[tokio::test]
async fn test_partial_failure_is_scoped_to_failing_subgraph() {
    let users = spawn_subgraph(
        "users",
        &[("me", false)],
        &[],
        json!({ "data": { "me": { "id": "u1" } } }),
    )
    .await;
    let listings = spawn_subgraph(
        "listings",
        &[("listings", true)],
        &[],
        json!({ "data": { "listings": [{ "id": "l1" }, { "id": "l2" }] } }),
    )
    .await;
    let reviews = spawn_subgraph(
        "reviews",
        &[("reviews", true)],
        &[],
        json!({ "data": { "reviews": [] } }),
    )
    .await;

    let config = test_config(vec![users.config(), listings.config(), reviews.config()]);
    let app = router(gateway(config).await);
    reviews.set_healthy(false);

    let res = post_graphql(&app, "{ me { id } listings { id } reviews { id } }").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["me"]["id"], "u1");
    assert_eq!(res.body["data"]["listings"][1]["id"], "l2");
    assert!(res.body["data"]["reviews"].is_null());

    let errors = res.body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["path"], json!(["reviews"]));
    assert_eq!(errors[0]["extensions"]["code"], "SUBGRAPH_UNAVAILABLE");
    assert_eq!(errors[0]["extensions"]["serviceName"], "reviews");

    assert_eq!(users.operations().len(), 1);
    assert_eq!(listings.operations().len(), 1);
}

#[tokio::test]
async fn test_subgraph_unreachable_at_startup_is_left_out() {
    let users = spawn_subgraph(
        "users",
        &[("me", false)],
        &[],
        json!({ "data": { "me": { "id": "u1" } } }),
    )
    .await;
    let config = test_config(vec![
        users.config(),
        SubgraphConfig {
            name: "reviews".into(),
            url: unreachable_url().await,
        },
    ]);
    let state = gateway(config).await;
    assert_eq!(state.registry.supergraph().members, vec!["users"]);
    let app = router(state);

    let res = send(&app, get("/health")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ready");
    assert_eq!(res.body["services"][1]["reachable"], false);

    let res = post_graphql(&app, "{ me { id } reviews { id } }").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&res.body), Some("GRAPHQL_VALIDATION_FAILED"));
    assert!(users.operations().is_empty());
}

#[tokio::test]
async fn test_reprobe_recomposes_when_subgraph_recovers() {
    let reviews = spawn_subgraph(
        "reviews",
        &[("reviews", true)],
        &[],
        json!({ "data": { "reviews": [] } }),
    )
    .await;
    reviews.set_healthy(false);

    let mut config = test_config(vec![reviews.config()]);
    config.probe.reprobe_enabled = true;
    let state = gateway(config.clone()).await;
    assert!(!state.registry.supergraph().is_composed());

    reviews.set_healthy(true);
    let mut monitor = HealthMonitor::new(state.registry.clone(), config.probe);
    assert!(monitor.check_all().await);

    let supergraph = state.registry.supergraph();
    assert!(supergraph.is_composed());
    assert_eq!(supergraph.members, vec!["reviews"]);

    let app = router(state);
    let res = post_graphql(&app, "{ reviews { id } }").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.get("errors").is_none());
}

#[tokio::test]
async fn test_identity_headers_forwarded_only_when_present() {
    let users = spawn_subgraph(
        "users",
        &[("me", false)],
        &[],
        json!({ "data": { "me": { "id": "u1" } } }),
    )
    .await;
    let app = router(gateway(test_config(vec![users.config()])).await);

    let mut request = graphql_request(json!({ "query": "{ me { id } }" }));
    let headers = request.headers_mut();
    headers.insert(header::AUTHORIZATION, "Bearer tok-123".parse().unwrap());
    headers.insert("x-user-id", "user-42".parse().unwrap());
    headers.insert("x-user-role", "host".parse().unwrap());
    headers.insert("x-request-id", "req-abc".parse().unwrap());
    let res = send(&app, request).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers["x-request-id"], "req-abc");

    let res = post_graphql(&app, "{ me { id } }").await;
    assert_eq!(res.status, StatusCode::OK);

    let calls = users.operations();
    assert_eq!(calls.len(), 2);

    let identified = &calls[0].headers;
    assert_eq!(identified[header::AUTHORIZATION], "Bearer tok-123");
    assert_eq!(identified["x-user-id"], "user-42");
    assert_eq!(identified["x-user-role"], "host");
    assert_eq!(identified["x-request-id"], "req-abc");

    let anonymous = &calls[1].headers;
    assert!(anonymous.get(header::AUTHORIZATION).is_none());
    assert!(anonymous.get("x-user-id").is_none());
    assert!(anonymous.get("x-user-role").is_none());
    assert!(anonymous.get("x-request-id").is_some());
}

#[tokio::test]
async fn test_protected_field_requires_identity() {
    let users = spawn_subgraph(
        "users",
        &[("me", false)],
        &[],
        json!({ "data": { "me": { "id": "u1" } } }),
    )
    .await;
    let mut config = test_config(vec![users.config()]);
    config.query.protected_fields = vec!["me".to_string()];
    let app = router(gateway(config).await);

    let res = post_graphql(&app, "{ me { id } }").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["data"]["me"].is_null());
    assert_eq!(error_code(&res.body), Some("UNAUTHENTICATED"));
    assert!(users.operations().is_empty());

    let mut request = graphql_request(json!({ "query": "{ me { id } }" }));
    request
        .headers_mut()
        .insert("x-user-id", "user-42".parse().unwrap());
    let res = send(&app, request).await;
    assert_eq!(res.body["data"]["me"]["id"], "u1");
    assert_eq!(users.operations().len(), 1);
}

#[tokio::test]
async fn test_mutation_forwards_only_used_variables() {
    let users = spawn_subgraph(
        "users",
        &[("me", false)],
        &[("updateProfile", false)],
        json!({ "data": { "updateProfile": { "id": "u1" } } }),
    )
    .await;
    let app = router(gateway(test_config(vec![users.config()])).await);

    let res = send(
        &app,
        graphql_request(json!({
            "query": "mutation Update($name: String, $unused: Int) { updateProfile(name: $name) { id } }",
            "operationName": "Update",
            "variables": { "name": "Ada", "unused": 7 }
        })),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["updateProfile"]["id"], "u1");

    let calls = users.operations();
    assert_eq!(calls.len(), 1);
    let forwarded = &calls[0].body;
    assert_eq!(forwarded["operationName"], "Update");
    assert_eq!(forwarded["variables"], json!({ "name": "Ada" }));
    let query = forwarded["query"].as_str().unwrap();
    assert!(query.starts_with("mutation Update"));
    assert!(!query.contains("$unused"));
}

#[tokio::test]
async fn test_skip_uses_declared_variable_default() {
    let users = spawn_subgraph(
        "users",
        &[("me", false)],
        &[],
        json!({ "data": { "me": { "id": "u1" } } }),
    )
    .await;
    let app = router(gateway(test_config(vec![users.config()])).await);

    let query = "query Q($hide: Boolean = true) { me @skip(if: $hide) { id } __typename }";
    let res = post_graphql(&app, query).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"], json!({ "__typename": "Query" }));
    assert!(users.operations().is_empty());

    let res = send(
        &app,
        graphql_request(json!({ "query": query, "variables": { "hide": false } })),
    )
    .await;
    assert_eq!(res.body["data"]["me"]["id"], "u1");
    assert_eq!(users.operations().len(), 1);
}

#[tokio::test]
async fn test_production_masks_unknown_subgraph_errors() {
    let crash = json!({
        "data": { "me": null },
        "errors": [{
            "message": "relation \"users\" does not exist",
            "path": ["me"],
            "extensions": { "exception": { "stacktrace": ["at query (pool.js:12)"] } }
        }]
    });
    let users = spawn_subgraph("users", &[("me", false)], &[], crash).await;

    let app = router(gateway(test_config(vec![users.config()])).await);
    let res = post_graphql(&app, "{ me { id } }").await;
    assert_eq!(res.body["errors"][0]["message"], "relation \"users\" does not exist");
    assert!(res.body["errors"][0]["extensions"]["exception"].is_object());

    let mut config = test_config(vec![users.config()]);
    config.security.mode = EnvironmentMode::Production;
    let app = router(gateway(config).await);
    let res = post_graphql(&app, "{ me { id } }").await;
    assert_eq!(res.status, StatusCode::OK);
    let error = &res.body["errors"][0];
    assert_eq!(error["message"], "Internal server error");
    assert_eq!(error["extensions"]["code"], "INTERNAL_SERVER_ERROR");
    assert!(error["extensions"].get("exception").is_none());
    assert_eq!(error["path"], json!(["me"]));
}

#[tokio::test]
async fn test_admin_api() {
    let mut config = test_config(vec![]);
    config.admin.enabled = true;
    config.admin.api_key = "admin-secret".to_string();
    let state = gateway(config).await;

    let app = router(state.clone());
    post_graphql(&app, "{ __typename }").await;

    let admin = setup_admin_router(state);
    let res = send(&admin, get("/admin/status")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let authorized = |path: &str| {
        Request::get(path)
            .header(header::AUTHORIZATION, "Bearer admin-secret")
            .body(Body::empty())
            .unwrap()
    };

    let res = send(&admin, authorized("/admin/status")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "degraded");
    assert_eq!(res.body["mode"], "development");
    assert_eq!(res.body["admission_stages"][0], "size_guard");

    let res = send(&admin, authorized("/admin/stats?recent=5")).await;
    assert_eq!(res.body["recorded"], 1);
    assert_eq!(res.body["recent"][0]["outcome"], "success");

    let res = send(&admin, authorized("/admin/limiter")).await;
    assert_eq!(res.body["tracked_clients"], 1);
    assert_eq!(res.body["max_requests"], 100);

    let res = send(&admin, authorized("/admin/subgraphs")).await;
    assert_eq!(res.body, json!([]));
}

#[tokio::test]
async fn test_real_listener_round_trip() {
    let users = spawn_subgraph(
        "users",
        &[("me", false)],
        &[],
        json!({ "data": { "me": { "id": "u1" } } }),
    )
    .await;
    let state = gateway(test_config(vec![users.config()])).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(GatewayServer::new(state).run(listener, shutdown.signalled()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .post(format!("http://{}/graphql", addr))
        .json(&json!({ "query": "{ me { id } }" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    assert!(res.headers().get("x-request-id").is_some());
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"]["me"]["id"], "u1");

    let forwarded = &users.operations()[0];
    assert!(forwarded.headers.get("x-request-id").is_some());

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
