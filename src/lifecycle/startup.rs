//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from the validated configuration
//! - Probe subgraphs and compose the supergraph before accepting traffic
//! - Start background tasks (limiter sweeper, health monitor)
//! - Bind the GraphQL and admin listeners and serve until a signal arrives
//!
//! # Design Decisions
//! - Unreachable subgraphs never fail startup; the gateway starts degraded
//! - Listeners start last (traffic only once the supergraph exists)
//! - Background tasks stop on the same shutdown broadcast as the listeners

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::setup_admin_router;
use crate::admission::AdmissionPipeline;
use crate::config::{GatewayConfig, SecurityConfig};
use crate::gateway::{Executor, Forwarder, Registry};
use crate::health::HealthMonitor;
use crate::http::server::{AppState, GatewayServer};
use crate::lifecycle::{signals::shutdown_signal, Shutdown};
use crate::observability::stats::OperationStats;
use crate::security::{ErrorMasker, RateLimiter};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to build subgraph client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the shared state: probe subgraphs, compose, wire admission and execution.
pub async fn build_gateway(config: GatewayConfig) -> Result<AppState, StartupError> {
    let security = Arc::new(SecurityConfig::resolve(&config));
    let forwarder = Forwarder::new(Duration::from_millis(config.timeouts.subgraph_ms))?;

    let registry = Arc::new(Registry::new(
        &config.subgraphs,
        &config.probe,
        forwarder.clone(),
    ));
    let reachable = registry.probe_all().await;
    if reachable == 0 {
        tracing::warn!(
            configured = config.subgraphs.len(),
            "No subgraph reachable, serving the degraded health schema"
        );
    } else {
        tracing::info!(
            reachable,
            configured = config.subgraphs.len(),
            "Supergraph ready"
        );
    }

    let limiter = Arc::new(RateLimiter::from_security(&security));
    let executor = Arc::new(Executor::new(
        forwarder,
        security.protected_fields.clone(),
        config.probe.reprobe_enabled,
    ));
    let admission = Arc::new(AdmissionPipeline::standard(security.clone(), limiter.clone()));

    Ok(AppState {
        masker: ErrorMasker::new(security.mode),
        stats: Arc::new(OperationStats::new(config.observability.stats_capacity)),
        config: Arc::new(config),
        security,
        registry,
        executor,
        admission,
        limiter,
        started_at: Instant::now(),
    })
}

/// Spawn the limiter sweeper and the health monitor.
pub fn spawn_background(state: &AppState, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    if state.limiter.is_enabled() {
        let interval = Duration::from_millis(state.config.rate_limit.sweep_interval_ms);
        handles.push(tokio::spawn(
            state.limiter.clone().run_sweeper(interval, shutdown.subscribe()),
        ));
    }

    let monitor = HealthMonitor::new(state.registry.clone(), state.config.probe.clone());
    handles.push(tokio::spawn(monitor.run(shutdown.subscribe())));

    handles
}

/// Run the gateway until SIGINT/SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    let state = build_gateway(config).await?;
    let shutdown = Shutdown::new();
    let background = spawn_background(&state, &shutdown);

    let admin = if state.config.admin.enabled {
        let listener = bind(&state.config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let app = setup_admin_router(state.clone())
            .into_make_service_with_connect_info::<SocketAddr>();
        let signalled = shutdown.signalled();
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(signalled)
                .await
            {
                tracing::error!(error = %e, "Admin API server failed");
            }
        }))
    } else {
        None
    };

    let listener = bind(&state.config.listener.bind_address).await?;
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    let served = GatewayServer::new(state)
        .run(listener, shutdown.signalled())
        .await;

    // The server may also stop on its own error; make sure everything else stops too.
    shutdown.trigger();
    for handle in background.into_iter().chain(admin) {
        let _ = handle.await;
    }

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}
