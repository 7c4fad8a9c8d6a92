//! Root-field execution against the supergraph.
//!
//! # Data Flow
//! ```text
//! QueryShape (admitted)
//!     → plan: each root field is local, protected, or owned by a subgraph
//!     → group remote fields by owner (document order)
//!     → query groups concurrently / mutation groups serially
//!     → merge data by response key, scope failures to their root fields
//! ```
//!
//! # Design Decisions
//! - Subgraph calls live inside the request future and are never spawned, so a client
//!   disconnect drops them; an in-flight guard records the abandonment
//! - Unknown root fields fail validation before any subgraph is called
//! - A subgraph marked unreachable fails fast while the health monitor runs

use futures_util::future::join_all;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{GatewayError, GraphQLError, GraphQLResponse};
use crate::gateway::composer::Supergraph;
use crate::gateway::forwarder::{Forwarder, SubgraphRequest};
use crate::gateway::local;
use crate::gateway::registry::{Registry, Subgraph};
use crate::health::passive;
use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::query::printer::{print_operation, used_variables};
use crate::query::{FieldNode, OperationKind, QueryShape};

/// Result of executing one admitted operation.
#[derive(Debug)]
pub struct Execution {
    pub response: GraphQLResponse,
    /// Subgraphs contacted, in call order.
    pub subgraphs: Vec<String>,
}

enum Resolution {
    Local,
    Protected,
    Remote(Arc<Subgraph>),
}

struct Group<'a> {
    subgraph: Arc<Subgraph>,
    fields: Vec<&'a FieldNode>,
}

pub struct Executor {
    forwarder: Forwarder,
    protected_fields: HashSet<String>,
    fail_fast: bool,
}

impl Executor {
    pub fn new(forwarder: Forwarder, protected_fields: HashSet<String>, fail_fast: bool) -> Self {
        Self {
            forwarder,
            protected_fields,
            fail_fast,
        }
    }

    pub async fn execute(
        &self,
        registry: &Registry,
        supergraph: &Supergraph,
        shape: &QueryShape,
        variables: &Map<String, Value>,
        context: &RequestContext,
    ) -> Result<Execution, GatewayError> {
        let plan = self.plan(supergraph, shape, variables, context)?;

        let mut groups: Vec<Group<'_>> = Vec::new();
        for (field, resolution) in &plan {
            if let Resolution::Remote(subgraph) = resolution {
                match groups.iter_mut().find(|g| Arc::ptr_eq(&g.subgraph, subgraph)) {
                    Some(group) => group.fields.push(*field),
                    None => groups.push(Group {
                        subgraph: subgraph.clone(),
                        fields: vec![*field],
                    }),
                }
            }
        }

        let mut guard = InFlightGuard::new(context.request_id.as_deref(), groups.len());
        let results = match shape.kind {
            OperationKind::Query => {
                join_all(groups.iter().map(|g| self.call(g, shape, variables, context))).await
            }
            OperationKind::Mutation => {
                let mut results = Vec::with_capacity(groups.len());
                for group in &groups {
                    results.push(self.call(group, shape, variables, context).await);
                }
                results
            }
        };
        guard.complete();

        let mut remote_values: HashMap<String, Value> = HashMap::new();
        let mut errors: Vec<GraphQLError> = Vec::new();
        for (group, result) in groups.iter().zip(results) {
            match result {
                Ok(response) => {
                    let data = response.data.unwrap_or(Value::Null);
                    for field in &group.fields {
                        let key = field.response_key();
                        let value = data.get(key).cloned().unwrap_or(Value::Null);
                        remote_values.insert(key.to_string(), value);
                    }
                    errors.extend(response.errors);
                }
                Err(err) => {
                    for field in &group.fields {
                        let key = field.response_key();
                        remote_values.insert(key.to_string(), Value::Null);
                        let mut error = err.to_graphql_error().at_root_field(key);
                        error.locations = vec![field.location];
                        errors.push(error);
                    }
                }
            }
        }

        let mut data = Map::new();
        for (field, resolution) in &plan {
            let key = field.response_key();
            if data.contains_key(key) {
                continue;
            }
            let value = match resolution {
                Resolution::Local => {
                    local::resolve(field, shape.kind, supergraph, || registry.health_report())
                }
                Resolution::Protected => {
                    let mut error = GatewayError::Unauthenticated {
                        field: field.name.clone(),
                    }
                    .to_graphql_error()
                    .at_root_field(key);
                    error.locations = vec![field.location];
                    errors.push(error);
                    Value::Null
                }
                Resolution::Remote(_) => remote_values.remove(key).unwrap_or(Value::Null),
            };
            data.insert(key.to_string(), value);
        }

        Ok(Execution {
            response: GraphQLResponse {
                data: Some(Value::Object(data)),
                errors,
            },
            subgraphs: groups.iter().map(|g| g.subgraph.name.clone()).collect(),
        })
    }

    fn plan<'a>(
        &self,
        supergraph: &Supergraph,
        shape: &'a QueryShape,
        variables: &Map<String, Value>,
        context: &RequestContext,
    ) -> Result<Vec<(&'a FieldNode, Resolution)>, GatewayError> {
        shape
            .executable_root_fields(variables)
            .into_iter()
            .map(|field| {
                let resolution = if local::is_local_field(shape.kind, &field.name) {
                    Resolution::Local
                } else {
                    let owner = supergraph.owner(shape.kind, &field.name).ok_or_else(|| {
                        GatewayError::ValidationFailed(format!(
                            "Cannot query field \"{}\" on type \"{}\".",
                            field.name,
                            shape.kind.root_type()
                        ))
                    })?;
                    if self.protected_fields.contains(&field.name) && !context.is_authenticated() {
                        Resolution::Protected
                    } else {
                        Resolution::Remote(owner.clone())
                    }
                };
                Ok((field, resolution))
            })
            .collect()
    }

    async fn call(
        &self,
        group: &Group<'_>,
        shape: &QueryShape,
        variables: &Map<String, Value>,
        context: &RequestContext,
    ) -> Result<GraphQLResponse, GatewayError> {
        let subgraph = &group.subgraph;
        if self.fail_fast && !subgraph.health.is_reachable() {
            metrics::record_subgraph_request(&subgraph.name, "circuit_open");
            return Err(GatewayError::SubgraphUnavailable {
                subgraph: subgraph.name.clone(),
                reason: "subgraph is marked unreachable".to_string(),
            });
        }

        let used = used_variables(&group.fields);
        let request = SubgraphRequest {
            query: print_operation(
                shape.kind,
                shape.name.as_deref(),
                &shape.variables,
                &group.fields,
            ),
            operation_name: shape.name.clone(),
            variables: variables
                .iter()
                .filter(|(name, _)| used.contains(*name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        };

        tracing::debug!(
            subgraph = %subgraph.name,
            request_id = context.request_id.as_deref().unwrap_or("-"),
            fields = group.fields.len(),
            "Forwarding root fields"
        );

        let outcome = self
            .forwarder
            .send(&subgraph.url, &request, Some(context))
            .await;
        passive::observe(&subgraph.name, &subgraph.health, &outcome);

        outcome.map_err(|e| {
            tracing::warn!(subgraph = %subgraph.name, error = %e, "Subgraph call failed");
            GatewayError::SubgraphUnavailable {
                subgraph: subgraph.name.clone(),
                reason: e.to_string(),
            }
        })
    }
}

/// Logs and counts requests dropped while subgraph calls were in flight.
struct InFlightGuard<'a> {
    request_id: Option<&'a str>,
    calls: usize,
    completed: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(request_id: Option<&'a str>, calls: usize) -> Self {
        Self {
            request_id,
            calls,
            completed: false,
        }
    }

    fn complete(&mut self) {
        self.completed = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.completed && self.calls > 0 {
            tracing::warn!(
                request_id = self.request_id.unwrap_or("-"),
                calls = self.calls,
                "Client went away, abandoning in-flight subgraph calls"
            );
            metrics::record_abandoned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProbeConfig, SubgraphConfig};
    use crate::gateway::registry::SubgraphSchema;
    use serde_json::json;
    use std::time::Duration;

    fn schema(root_fields: &[&str]) -> SubgraphSchema {
        let fields: Vec<Value> = root_fields
            .iter()
            .map(|name| json!({ "name": name, "args": [], "type": { "kind": "SCALAR", "name": "String", "ofType": null } }))
            .collect();
        SubgraphSchema {
            query_type: Some("Query".into()),
            mutation_type: None,
            types: vec![json!({ "kind": "OBJECT", "name": "Query", "fields": fields })],
            directives: vec![],
        }
    }

    /// Registry whose only subgraph is composed but unreachable.
    fn setup(protected: &[&str]) -> (Registry, Arc<Supergraph>, Executor) {
        let forwarder = Forwarder::new(Duration::from_millis(500)).unwrap();
        let registry = Registry::new(
            &[SubgraphConfig {
                name: "users".into(),
                url: "http://127.0.0.1:9/graphql".into(),
            }],
            &ProbeConfig::default(),
            forwarder.clone(),
        );
        let users = &registry.subgraphs()[0];
        users.set_schema(schema(&["me", "secret"]));
        users.health.force(false);
        let supergraph = registry.recompose();
        let executor = Executor::new(
            forwarder,
            protected.iter().map(|s| s.to_string()).collect(),
            true,
        );
        (registry, supergraph, executor)
    }

    async fn run(executor: &Executor, registry: &Registry, supergraph: &Supergraph, query: &str) -> Result<Execution, GatewayError> {
        let shape = QueryShape::parse(query, None).unwrap();
        executor
            .execute(registry, supergraph, &shape, &Map::new(), &RequestContext::default())
            .await
    }

    #[tokio::test]
    async fn test_unknown_root_field_fails_validation() {
        let (registry, supergraph, executor) = setup(&[]);
        let err = run(&executor, &registry, &supergraph, "{ me bookings }")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::ValidationFailed("Cannot query field \"bookings\" on type \"Query\".".into())
        );
    }

    #[tokio::test]
    async fn test_unreachable_subgraph_scopes_error_and_keeps_local_fields() {
        let (registry, supergraph, executor) = setup(&[]);
        let execution = run(&executor, &registry, &supergraph, "{ __typename me health { status } }")
            .await
            .unwrap();

        let data = execution.response.data.unwrap();
        assert_eq!(data["__typename"], "Query");
        assert!(data["me"].is_null());
        assert_eq!(data["health"]["status"], "ready");

        let errors = execution.response.errors;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), Some("SUBGRAPH_UNAVAILABLE"));
        assert_eq!(errors[0].path, Some(vec![json!("me")]));
        assert_eq!(execution.subgraphs, vec!["users"]);
    }

    #[tokio::test]
    async fn test_protected_field_requires_identity() {
        let (registry, supergraph, executor) = setup(&["secret"]);
        let execution = run(&executor, &registry, &supergraph, "{ s: secret }")
            .await
            .unwrap();

        assert!(execution.subgraphs.is_empty());
        assert_eq!(execution.response.data.unwrap(), json!({ "s": null }));
        assert_eq!(execution.response.errors[0].code(), Some("UNAUTHENTICATED"));
        assert_eq!(execution.response.errors[0].path, Some(vec![json!("s")]));
    }

    #[tokio::test]
    async fn test_skipped_fields_are_not_planned() {
        let (registry, supergraph, executor) = setup(&[]);
        let execution = run(&executor, &registry, &supergraph, "{ me @skip(if: true) __typename }")
            .await
            .unwrap();
        assert!(execution.subgraphs.is_empty());
        assert!(execution.response.errors.is_empty());
        assert_eq!(execution.response.data.unwrap(), json!({ "__typename": "Query" }));
    }
}
