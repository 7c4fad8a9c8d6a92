//! Root fields answered by the gateway itself.
//!
//! `__typename`, `__schema`, `__type(name:)` and `health` are resolved from in-memory JSON
//! by projecting the requested selection set over it.

use serde_json::{Map, Value};

use crate::gateway::composer::{Supergraph, HEALTH_FIELD};
use crate::gateway::registry::HealthReport;
use crate::query::introspection::{SCHEMA_FIELD, TYPENAME_FIELD, TYPE_FIELD};
use crate::query::{FieldNode, OperationKind, SelectionNode};

/// Whether the gateway answers this root field without a subgraph.
pub fn is_local_field(kind: OperationKind, name: &str) -> bool {
    match kind {
        OperationKind::Query => {
            matches!(name, TYPENAME_FIELD | SCHEMA_FIELD | TYPE_FIELD | HEALTH_FIELD)
        }
        OperationKind::Mutation => name == TYPENAME_FIELD,
    }
}

/// Resolve a local root field to its response value.
pub fn resolve(
    field: &FieldNode,
    kind: OperationKind,
    supergraph: &Supergraph,
    health: impl FnOnce() -> HealthReport,
) -> Value {
    match field.name.as_str() {
        TYPENAME_FIELD => Value::from(kind.root_type()),
        SCHEMA_FIELD => project(&supergraph.introspection, &field.selections, "__Schema"),
        TYPE_FIELD => {
            let requested = field.argument("name").and_then(|v| match v {
                async_graphql_value::Value::String(s) => Some(s.as_str()),
                _ => None,
            });
            match requested.and_then(|name| supergraph.find_type(name)) {
                Some(ty) => project(ty, &field.selections, "__Type"),
                None => Value::Null,
            }
        }
        HEALTH_FIELD => match serde_json::to_value(health()) {
            Ok(report) => project(&report, &field.selections, "GatewayHealth"),
            Err(_) => Value::Null,
        },
        _ => Value::Null,
    }
}

/// Project `value` onto `selections`. `typename` names the value's GraphQL type.
pub fn project(value: &Value, selections: &[SelectionNode], typename: &'static str) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| project(item, selections, typename))
                .collect(),
        ),
        Value::Object(object) if !selections.is_empty() => {
            let mut out = Map::new();
            project_into(object, selections, typename, &mut out);
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn project_into(
    object: &Map<String, Value>,
    selections: &[SelectionNode],
    typename: &'static str,
    out: &mut Map<String, Value>,
) {
    for selection in selections {
        match selection {
            SelectionNode::Field(field) => {
                let key = field.response_key().to_string();
                if out.contains_key(&key) {
                    continue;
                }
                let value = if field.name == TYPENAME_FIELD {
                    Value::from(typename)
                } else {
                    let child = object.get(&field.name).unwrap_or(&Value::Null);
                    let child = filter_deprecated(field, child);
                    project(&child, &field.selections, child_typename(typename, &field.name))
                };
                out.insert(key, value);
            }
            SelectionNode::InlineFragment(fragment) => {
                let applies = fragment
                    .type_condition
                    .as_deref()
                    .map_or(true, |condition| condition == typename);
                if applies {
                    project_into(object, &fragment.selections, typename, out);
                }
            }
        }
    }
}

/// `fields` and `enumValues` hide deprecated entries unless `includeDeprecated: true`.
fn filter_deprecated(field: &FieldNode, value: &Value) -> Value {
    if !matches!(field.name.as_str(), "fields" | "enumValues") {
        return value.clone();
    }
    let include = matches!(
        field.argument("includeDeprecated"),
        Some(async_graphql_value::Value::Boolean(true))
    );
    match value {
        Value::Array(items) if !include => Value::Array(
            items
                .iter()
                .filter(|item| item["isDeprecated"].as_bool() != Some(true))
                .cloned()
                .collect(),
        ),
        other => other.clone(),
    }
}

fn child_typename(parent: &str, field: &str) -> &'static str {
    match (parent, field) {
        ("GatewayHealth", "services") => "ServiceStatus",
        (_, "types" | "queryType" | "mutationType" | "subscriptionType" | "type" | "ofType")
        | (_, "interfaces" | "possibleTypes") => "__Type",
        (_, "fields") => "__Field",
        (_, "args" | "inputFields") => "__InputValue",
        (_, "enumValues") => "__EnumValue",
        (_, "directives") => "__Directive",
        _ => "",
    }
}
