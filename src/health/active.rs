//! Active re-probing of subgraphs.
//!
//! # Responsibilities
//! - Periodically re-probe every subgraph with the introspection query
//! - Move reachability through the hysteresis thresholds
//! - Back off exponentially from subgraphs that keep failing
//! - Recompose the supergraph when a subgraph's schema appears or changes

use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::ProbeConfig;
use crate::gateway::registry::{Registry, Subgraph};
use crate::health::state::HealthState;
use crate::observability::metrics;
use crate::resilience::Backoff;

pub struct HealthMonitor {
    registry: Arc<Registry>,
    config: ProbeConfig,
    backoff: Backoff,
    next_probe: HashMap<String, Instant>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<Registry>, config: ProbeConfig) -> Self {
        Self {
            registry,
            backoff: Backoff::from_probe(&config),
            config,
            next_probe: HashMap::new(),
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.reprobe_enabled {
            tracing::info!("Subgraph re-probing disabled, startup probe is final");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            "Health monitor starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs);
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every subgraph whose backoff has elapsed. Returns true if recomposed.
    pub async fn check_all(&mut self) -> bool {
        let now = Instant::now();
        let due: Vec<Arc<Subgraph>> = self
            .registry
            .subgraphs()
            .iter()
            .filter(|s| self.next_probe.get(&s.name).map_or(true, |at| now >= *at))
            .cloned()
            .collect();

        let registry = &self.registry;
        let results = join_all(due.iter().map(|s| registry.probe(s))).await;

        let mut schema_changed = false;
        for (subgraph, result) in due.iter().zip(results) {
            let transition = match result {
                Ok(schema) => {
                    self.next_probe.remove(&subgraph.name);
                    if subgraph.set_schema(schema) {
                        tracing::info!(subgraph = %subgraph.name, "Subgraph schema changed");
                        schema_changed = true;
                    }
                    subgraph.health.mark_success()
                }
                Err(e) => {
                    let transition = subgraph.health.mark_failure();
                    let failures = subgraph.health.consecutive_failures();
                    let delay = self.backoff.delay(failures);
                    self.next_probe.insert(subgraph.name.clone(), now + delay);
                    tracing::debug!(
                        subgraph = %subgraph.name,
                        error = %e,
                        failures,
                        retry_in = ?delay,
                        "Subgraph probe failed"
                    );
                    transition
                }
            };

            match transition {
                Some(HealthState::Reachable) => {
                    tracing::info!(subgraph = %subgraph.name, "Subgraph reachable again")
                }
                Some(HealthState::Unreachable) => {
                    tracing::warn!(subgraph = %subgraph.name, "Subgraph marked unreachable")
                }
                _ => {}
            }
            metrics::record_subgraph_reachable(&subgraph.name, subgraph.health.is_reachable());
        }

        if schema_changed {
            self.registry.recompose();
        }
        schema_changed
    }
}
