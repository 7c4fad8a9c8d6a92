//! HTTP server setup and the GraphQL endpoint.
//!
//! # Responsibilities
//! - Create the Axum router for `/graphql` and `/health`
//! - Wire up middleware (security headers, request ID, tracing, timeout)
//! - Run admission, execution and masking for each GraphQL request
//! - Record metrics and operation stats for every outcome
//! - Serve with graceful shutdown

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admission::{AdmissionContext, AdmissionPipeline, Phase};
use crate::config::{GatewayConfig, SecurityConfig};
use crate::error::{GatewayError, GraphQLResponse};
use crate::gateway::{Execution, Executor, Registry};
use crate::http::request::{MakeRequestUuid, RequestContext};
use crate::http::response::{graphql_response, rejection_response};
use crate::observability::metrics;
use crate::observability::stats::{OperationRecord, OperationStats};
use crate::security::headers::{apply_cors, preflight_response, with_security_headers};
use crate::security::limits::read_body_capped;
use crate::security::{ErrorMasker, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub security: Arc<SecurityConfig>,
    pub registry: Arc<Registry>,
    pub executor: Arc<Executor>,
    pub admission: Arc<AdmissionPipeline>,
    pub limiter: Arc<RateLimiter>,
    pub masker: ErrorMasker,
    pub stats: Arc<OperationStats>,
    pub started_at: Instant,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(state: AppState) -> Self {
        let timeout = Duration::from_secs(state.config.timeouts.request_secs);
        Self {
            router: build_router(state, timeout),
        }
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let router = Router::new()
        .route("/graphql", post(graphql_handler).options(preflight_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    with_security_headers(router)
}

async fn preflight_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    preflight_response(&headers, &state.security.allowed_origins)
}

/// Gateway status for load balancers: 200 when composed, 503 when degraded.
async fn health_handler(State(state): State<AppState>) -> Response {
    let report = state.registry.health_report();
    let status = if state.registry.supergraph().is_composed() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

async fn graphql_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    let context = RequestContext::from_headers(&parts.headers, peer, state.security.trust_forwarded_for);
    let mut admission = AdmissionContext::new(parts.headers, context, state.registry.supergraph());

    let result = admit_and_execute(&state, &mut admission, body).await;

    let (mut response, outcome, error_code, subgraphs) = match result {
        Ok(execution) => {
            let Execution {
                response: GraphQLResponse { data, errors },
                subgraphs,
            } = execution;
            let outcome = if errors.is_empty() { "success" } else { "partial" };
            let error_code = errors.first().and_then(|e| e.code()).map(str::to_string);
            let body = GraphQLResponse {
                data,
                errors: state.masker.mask_all(errors),
            };
            (graphql_response(StatusCode::OK, body), outcome, error_code, subgraphs)
        }
        Err(err) => {
            metrics::record_admission_rejection(err.code());
            if matches!(err, GatewayError::Internal(_)) {
                tracing::error!(error = %err, "Request failed");
            }
            (
                rejection_response(&err, &state.masker),
                "rejected",
                Some(err.code().as_str().to_string()),
                Vec::new(),
            )
        }
    };
    apply_cors(response.headers_mut(), admission.origin.as_ref());

    let request_id = admission.request.request_id.clone().unwrap_or_default();
    tracing::info!(
        request_id = %request_id,
        client = %admission.request.client_identity,
        operation = admission.operation_name.as_deref().unwrap_or("<anonymous>"),
        depth = ?admission.depth,
        complexity = ?admission.complexity,
        status = response.status().as_u16(),
        outcome,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "GraphQL request finished"
    );

    metrics::record_request(outcome, start);
    state.stats.record(OperationRecord {
        timestamp: Utc::now(),
        request_id,
        operation_name: admission.operation_name.clone(),
        operation_kind: admission.shape.as_ref().map(|s| s.kind.as_str()),
        depth: admission.depth,
        complexity: admission.complexity,
        subgraphs,
        outcome,
        error_code,
        duration_ms: start.elapsed().as_millis() as u64,
    });

    response
}

/// Header phase, capped body read, document phase, then execution.
async fn admit_and_execute(
    state: &AppState,
    admission: &mut AdmissionContext,
    body: Body,
) -> Result<Execution, GatewayError> {
    state.admission.run_phase(Phase::Headers, admission)?;
    admission.body = read_body_capped(body, state.security.max_request_bytes).await?;
    state.admission.run_phase(Phase::Document, admission)?;

    let shape = admission.shape()?;
    state
        .executor
        .execute(
            &state.registry,
            &admission.supergraph,
            shape,
            &admission.variables,
            &admission.request,
        )
        .await
}
