//! Supergraph composition.
//!
//! Root `Query`/`Mutation` fields are routed to the subgraph that declares them (first
//! configured owner wins on conflicts). Other types are merged by name for introspection.
//! With no composable subgraph the result is the degraded stand-in, which exposes only
//! the gateway's own `health` field.

use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::gateway::registry::Subgraph;
use crate::query::OperationKind;

/// Root field answered by the gateway itself in every mode.
pub const HEALTH_FIELD: &str = "health";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupergraphMode {
    Composed,
    Degraded,
}

impl SupergraphMode {
    /// Status reported by the health query.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Composed => "ready",
            Self::Degraded => "degraded",
        }
    }
}

/// The composed schema the gateway exposes.
pub struct Supergraph {
    pub mode: SupergraphMode,
    /// Names of the subgraphs composed into this supergraph, in configured order.
    pub members: Vec<String>,
    query_owners: HashMap<String, Arc<Subgraph>>,
    mutation_owners: HashMap<String, Arc<Subgraph>>,
    /// Merged `__schema` value.
    pub introspection: Value,
    /// Field names whose type is a list in some subgraph.
    pub list_fields: HashSet<String>,
}

impl Supergraph {
    pub fn degraded() -> Self {
        compose(&[])
    }

    pub fn is_composed(&self) -> bool {
        self.mode == SupergraphMode::Composed
    }

    pub fn owner(&self, kind: OperationKind, field: &str) -> Option<&Arc<Subgraph>> {
        match kind {
            OperationKind::Query => self.query_owners.get(field),
            OperationKind::Mutation => self.mutation_owners.get(field),
        }
    }

    pub fn root_field_count(&self, subgraph: &str) -> usize {
        self.query_owners
            .values()
            .chain(self.mutation_owners.values())
            .filter(|owner| owner.name == subgraph)
            .count()
    }

    pub fn has_mutations(&self) -> bool {
        !self.mutation_owners.is_empty()
    }

    /// Look up a named type in the merged introspection data.
    pub fn find_type(&self, name: &str) -> Option<&Value> {
        self.introspection["types"]
            .as_array()?
            .iter()
            .find(|ty| ty["name"].as_str() == Some(name))
    }
}

/// Compose every subgraph that has a known schema.
pub fn compose(subgraphs: &[Arc<Subgraph>]) -> Supergraph {
    let mut members = Vec::new();
    let mut query_owners: HashMap<String, Arc<Subgraph>> = HashMap::new();
    let mut mutation_owners: HashMap<String, Arc<Subgraph>> = HashMap::new();
    let mut query_fields: Vec<Value> = Vec::new();
    let mut mutation_fields: Vec<Value> = Vec::new();
    let mut types: Map<String, Value> = Map::new();
    let mut directives: Map<String, Value> = Map::new();
    let mut list_fields = HashSet::new();

    for subgraph in subgraphs {
        let Some(schema) = subgraph.schema() else {
            continue;
        };
        members.push(subgraph.name.clone());

        for ty in &schema.types {
            let Some(name) = ty["name"].as_str() else {
                continue;
            };
            collect_list_fields(ty, &mut list_fields);

            let root = if schema.query_type.as_deref() == Some(name) {
                Some((&mut query_owners, &mut query_fields))
            } else if schema.mutation_type.as_deref() == Some(name) {
                Some((&mut mutation_owners, &mut mutation_fields))
            } else {
                None
            };

            match root {
                Some((owners, fields)) => {
                    for field in ty["fields"].as_array().into_iter().flatten() {
                        let Some(field_name) = field["name"].as_str() else {
                            continue;
                        };
                        if field_name == HEALTH_FIELD {
                            tracing::warn!(
                                subgraph = %subgraph.name,
                                "Subgraph declares reserved root field 'health', ignoring it"
                            );
                            continue;
                        }
                        if let Some(owner) = owners.get(field_name) {
                            tracing::warn!(
                                field = %field_name,
                                owner = %owner.name,
                                ignored = %subgraph.name,
                                "Root field declared by multiple subgraphs, keeping first owner"
                            );
                            continue;
                        }
                        owners.insert(field_name.to_string(), subgraph.clone());
                        fields.push(field.clone());
                    }
                }
                None => merge_type(&mut types, name, ty),
            }
        }

        for directive in &schema.directives {
            if let Some(name) = directive["name"].as_str() {
                directives
                    .entry(name.to_string())
                    .or_insert_with(|| directive.clone());
            }
        }
    }

    let mode = if members.is_empty() {
        SupergraphMode::Degraded
    } else {
        SupergraphMode::Composed
    };

    query_fields.push(field_def(HEALTH_FIELD, non_null(named("OBJECT", "GatewayHealth"))));
    for (name, ty) in gateway_types() {
        types.entry(name.to_string()).or_insert(ty);
    }

    let mut all_types = vec![object_type("Query", query_fields)];
    let has_mutations = !mutation_fields.is_empty();
    if has_mutations {
        all_types.push(object_type("Mutation", mutation_fields));
    }
    all_types.extend(types.into_iter().map(|(_, ty)| ty));

    let introspection = json!({
        "description": null,
        "queryType": { "name": "Query" },
        "mutationType": if has_mutations { json!({ "name": "Mutation" }) } else { Value::Null },
        "subscriptionType": null,
        "types": all_types,
        "directives": directives.into_iter().map(|(_, d)| d).collect::<Vec<_>>(),
    });

    Supergraph {
        mode,
        members,
        query_owners,
        mutation_owners,
        introspection,
        list_fields,
    }
}

/// Merge `ty` into `types`, keeping the first definition's kind and appending
/// members the first definition lacks.
fn merge_type(types: &mut Map<String, Value>, name: &str, ty: &Value) {
    let Some(existing) = types.get_mut(name) else {
        types.insert(name.to_string(), ty.clone());
        return;
    };

    for key in ["fields", "inputFields", "enumValues", "interfaces", "possibleTypes"] {
        let Some(incoming) = ty[key].as_array() else {
            continue;
        };
        let Some(current) = existing.get_mut(key).and_then(Value::as_array_mut) else {
            continue;
        };
        for item in incoming {
            let name = item["name"].as_str();
            if !current.iter().any(|c| c["name"].as_str() == name) {
                current.push(item.clone());
            }
        }
    }
}

fn collect_list_fields(ty: &Value, out: &mut HashSet<String>) {
    for field in ty["fields"].as_array().into_iter().flatten() {
        let mut type_ref = &field["type"];
        while type_ref["kind"].as_str() == Some("NON_NULL") {
            type_ref = &type_ref["ofType"];
        }
        if type_ref["kind"].as_str() == Some("LIST") {
            if let Some(name) = field["name"].as_str() {
                out.insert(name.to_string());
            }
        }
    }
}

fn named(kind: &str, name: &str) -> Value {
    json!({ "kind": kind, "name": name, "ofType": null })
}

fn non_null(inner: Value) -> Value {
    json!({ "kind": "NON_NULL", "name": null, "ofType": inner })
}

fn list(inner: Value) -> Value {
    json!({ "kind": "LIST", "name": null, "ofType": inner })
}

fn field_def(name: &str, type_ref: Value) -> Value {
    json!({
        "name": name,
        "description": null,
        "args": [],
        "type": type_ref,
        "isDeprecated": false,
        "deprecationReason": null,
    })
}

fn object_type(name: &str, fields: Vec<Value>) -> Value {
    json!({
        "kind": "OBJECT",
        "name": name,
        "description": null,
        "fields": fields,
        "inputFields": null,
        "interfaces": [],
        "enumValues": null,
        "possibleTypes": null,
    })
}

fn scalar_type(name: &str) -> Value {
    json!({
        "kind": "SCALAR",
        "name": name,
        "description": null,
        "fields": null,
        "inputFields": null,
        "interfaces": null,
        "enumValues": null,
        "possibleTypes": null,
    })
}

fn gateway_types() -> Vec<(&'static str, Value)> {
    let string = || non_null(named("SCALAR", "String"));
    vec![
        (
            "GatewayHealth",
            object_type(
                "GatewayHealth",
                vec![
                    field_def("status", string()),
                    field_def("timestamp", string()),
                    field_def(
                        "services",
                        non_null(list(non_null(named("OBJECT", "ServiceStatus")))),
                    ),
                ],
            ),
        ),
        (
            "ServiceStatus",
            object_type(
                "ServiceStatus",
                vec![
                    field_def("name", string()),
                    field_def("url", string()),
                    field_def("reachable", non_null(named("SCALAR", "Boolean"))),
                ],
            ),
        ),
        ("String", scalar_type("String")),
        ("Boolean", scalar_type("Boolean")),
    ]
}
