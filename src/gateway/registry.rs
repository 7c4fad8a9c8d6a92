//! Subgraph registry.
//!
//! # Responsibilities
//! - Hold every configured subgraph with its reachability and last known schema
//! - Probe subgraphs concurrently with an introspection query under a short timeout
//! - Compose the supergraph and swap it atomically when membership changes
//!
//! # Design Decisions
//! - An unreachable subgraph never fails startup; it is left out of composition
//! - Once composed, a subgraph stays composed while down so its fields fail per field
//! - Readers take an `Arc` snapshot of the supergraph for the whole request

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ProbeConfig, SubgraphConfig};
use crate::gateway::composer::{compose, Supergraph};
use crate::gateway::forwarder::{ForwardError, Forwarder, SubgraphRequest};
use crate::health::state::HealthTracker;
use crate::observability::metrics;

pub const PROBE_OPERATION: &str = "GatewayProbe";

/// Introspection query used to probe subgraphs and learn their schema.
pub const PROBE_QUERY: &str = r#"query GatewayProbe {
  __schema {
    queryType { name }
    mutationType { name }
    types {
      kind
      name
      description
      fields(includeDeprecated: true) {
        name
        description
        args { ...InputValue }
        type { ...TypeRef }
        isDeprecated
        deprecationReason
      }
      inputFields { ...InputValue }
      interfaces { ...TypeRef }
      enumValues(includeDeprecated: true) { name description isDeprecated deprecationReason }
      possibleTypes { ...TypeRef }
    }
    directives { name description locations args { ...InputValue } }
  }
}
fragment InputValue on __InputValue { name description type { ...TypeRef } defaultValue }
fragment TypeRef on __Type {
  kind name ofType { kind name ofType { kind name ofType { kind name ofType {
    kind name ofType { kind name ofType { kind name } } } } } }
}"#;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("introspection rejected: {0}")]
    Rejected(String),

    #[error("response did not contain a schema")]
    MissingSchema,
}

/// What a subgraph told us about its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SubgraphSchema {
    pub query_type: Option<String>,
    pub mutation_type: Option<String>,
    pub types: Vec<Value>,
    pub directives: Vec<Value>,
}

impl SubgraphSchema {
    /// Read the `data` of an introspection response.
    pub fn from_introspection(data: &Value) -> Result<Self, ProbeError> {
        let schema = data.get("__schema").ok_or(ProbeError::MissingSchema)?;
        let types = schema["types"]
            .as_array()
            .cloned()
            .ok_or(ProbeError::MissingSchema)?;

        let root_name = |key: &str| schema[key]["name"].as_str().map(str::to_string);
        Ok(Self {
            query_type: root_name("queryType"),
            mutation_type: root_name("mutationType"),
            types,
            directives: schema["directives"].as_array().cloned().unwrap_or_default(),
        })
    }
}

/// One configured backend service.
#[derive(Debug)]
pub struct Subgraph {
    pub name: String,
    pub url: String,
    pub health: HealthTracker,
    schema: ArcSwapOption<SubgraphSchema>,
}

impl Subgraph {
    pub fn new(name: &str, url: &str, healthy_threshold: u32, unhealthy_threshold: u32) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            health: HealthTracker::new(healthy_threshold, unhealthy_threshold),
            schema: ArcSwapOption::empty(),
        }
    }

    pub fn schema(&self) -> Option<Arc<SubgraphSchema>> {
        self.schema.load_full()
    }

    /// Store a freshly probed schema. Returns true when it differs from the previous one.
    pub fn set_schema(&self, schema: SubgraphSchema) -> bool {
        let changed = self
            .schema
            .load()
            .as_deref()
            .map_or(true, |current| *current != schema);
        if changed {
            self.schema.store(Some(Arc::new(schema)));
        }
        changed
    }

    pub fn descriptor(&self) -> SubgraphDescriptor {
        SubgraphDescriptor {
            name: self.name.clone(),
            url: self.url.clone(),
            reachable: self.health.is_reachable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubgraphDescriptor {
    pub name: String,
    pub url: String,
    pub reachable: bool,
}

/// Gateway status, served by `GET /health` and the `health` root field.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    pub services: Vec<SubgraphDescriptor>,
}

pub struct Registry {
    subgraphs: Vec<Arc<Subgraph>>,
    supergraph: ArcSwap<Supergraph>,
    forwarder: Forwarder,
    probe_timeout: Duration,
}

impl Registry {
    pub fn new(subgraphs: &[SubgraphConfig], probe: &ProbeConfig, forwarder: Forwarder) -> Self {
        Self {
            subgraphs: subgraphs
                .iter()
                .map(|s| {
                    Arc::new(Subgraph::new(
                        &s.name,
                        &s.url,
                        probe.healthy_threshold,
                        probe.unhealthy_threshold,
                    ))
                })
                .collect(),
            supergraph: ArcSwap::from_pointee(Supergraph::degraded()),
            forwarder,
            probe_timeout: Duration::from_millis(probe.timeout_ms),
        }
    }

    pub fn subgraphs(&self) -> &[Arc<Subgraph>] {
        &self.subgraphs
    }

    pub fn subgraph(&self, name: &str) -> Option<&Arc<Subgraph>> {
        self.subgraphs.iter().find(|s| s.name == name)
    }

    /// Current supergraph snapshot.
    pub fn supergraph(&self) -> Arc<Supergraph> {
        self.supergraph.load_full()
    }

    /// Fetch a subgraph's schema with the probe timeout.
    pub async fn probe(&self, subgraph: &Subgraph) -> Result<SubgraphSchema, ProbeError> {
        let request = SubgraphRequest {
            query: PROBE_QUERY.to_string(),
            operation_name: Some(PROBE_OPERATION.to_string()),
            variables: Map::new(),
        };
        let response = self
            .forwarder
            .send_with_timeout(&subgraph.url, &request, None, self.probe_timeout)
            .await?;

        match response.data {
            Some(data) if !data.is_null() => SubgraphSchema::from_introspection(&data),
            _ => Err(response
                .errors
                .first()
                .map(|e| ProbeError::Rejected(e.message.clone()))
                .unwrap_or(ProbeError::MissingSchema)),
        }
    }

    /// Startup probe: every subgraph concurrently, then compose.
    ///
    /// Returns the number of reachable subgraphs.
    pub async fn probe_all(&self) -> usize {
        let results = join_all(self.subgraphs.iter().map(|s| self.probe(s))).await;

        let mut reachable = 0;
        for (subgraph, result) in self.subgraphs.iter().zip(results) {
            match result {
                Ok(schema) => {
                    reachable += 1;
                    subgraph.health.force(true);
                    subgraph.set_schema(schema);
                    tracing::info!(subgraph = %subgraph.name, url = %subgraph.url, "Subgraph reachable");
                }
                Err(e) => {
                    subgraph.health.force(false);
                    tracing::warn!(
                        subgraph = %subgraph.name,
                        url = %subgraph.url,
                        error = %e,
                        "Subgraph unreachable, excluding it from composition"
                    );
                }
            }
            metrics::record_subgraph_reachable(&subgraph.name, subgraph.health.is_reachable());
        }

        self.recompose();
        reachable
    }

    /// Rebuild the supergraph from every subgraph with a known schema and swap it in.
    pub fn recompose(&self) -> Arc<Supergraph> {
        let supergraph = Arc::new(compose(&self.subgraphs));
        tracing::info!(
            mode = supergraph.mode.status(),
            members = ?supergraph.members,
            "Supergraph composed"
        );
        self.supergraph.store(supergraph.clone());
        supergraph
    }

    pub fn descriptors(&self) -> Vec<SubgraphDescriptor> {
        self.subgraphs.iter().map(|s| s.descriptor()).collect()
    }

    pub fn health_report(&self) -> HealthReport {
        HealthReport {
            status: self.supergraph.load().mode.status(),
            timestamp: Utc::now().to_rfc3339(),
            services: self.descriptors(),
        }
    }
}
