//! Fragment-free query shape.
//!
//! The parsed document is lowered into a [`QueryShape`] for the selected operation:
//! fragment spreads are replaced by inline fragments carrying the fragment's type
//! condition, so the depth and complexity analyzers (and the subgraph printer) never
//! deal with fragment indirection.

use async_graphql_parser::types::{
    DocumentOperations, ExecutableDocument, FragmentDefinition, OperationDefinition,
    OperationType, Selection, SelectionSet,
};
use async_graphql_parser::Positioned;
use async_graphql_value::Value;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeSet, HashMap};

use crate::error::{GatewayError, Location};

/// Upper bound on selections produced by fragment inlining.
pub const MAX_EXPANDED_SELECTIONS: usize = 100_000;

/// Upper bound on nested selection sets, fields and fragments alike, while lowering.
/// Every later pass over a [`QueryShape`] recurses at most this deep.
pub const MAX_NESTING: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
        }
    }

    /// Name of the root type in the composed schema.
    pub fn root_type(&self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Mutation => "Mutation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    /// Printed type reference, e.g. `[ID!]!`.
    pub type_ref: String,
    /// Printed default value.
    pub default_value: Option<String>,
    /// Default value as JSON, used when the request omits the variable.
    pub default: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<(String, Value)>,
    pub directives: Vec<Directive>,
    pub selections: Vec<SelectionNode>,
    pub location: Location,
}

impl FieldNode {
    /// Key under which this field appears in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| value)
    }

    /// Variables referenced anywhere in this field's arguments, directives or subtree.
    pub fn collect_variables(&self, out: &mut BTreeSet<String>) {
        for (_, value) in &self.arguments {
            collect_value_variables(value, out);
        }
        for directive in &self.directives {
            for (_, value) in &directive.arguments {
                collect_value_variables(value, out);
            }
        }
        for selection in &self.selections {
            selection.collect_variables(out);
        }
    }

    /// Whether `@skip`/`@include` exclude this field for the given variables.
    pub fn is_skipped(&self, variables: &Map<String, JsonValue>) -> bool {
        skipped_by(&self.directives, variables)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragmentNode {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selections: Vec<SelectionNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionNode {
    Field(FieldNode),
    InlineFragment(InlineFragmentNode),
}

impl SelectionNode {
    fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Field(field) => field.collect_variables(out),
            Self::InlineFragment(fragment) => {
                for directive in &fragment.directives {
                    for (_, value) in &directive.arguments {
                        collect_value_variables(value, out);
                    }
                }
                for selection in &fragment.selections {
                    selection.collect_variables(out);
                }
            }
        }
    }
}

/// The selected operation with every fragment spread inlined.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryShape {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<VariableDefinition>,
    pub selections: Vec<SelectionNode>,
}

impl QueryShape {
    /// Parse a query document and lower the selected operation.
    pub fn parse(query: &str, operation_name: Option<&str>) -> Result<Self, GatewayError> {
        Self::parse_with_max_depth(query, operation_name, MAX_NESTING)
    }

    /// Like [`QueryShape::parse`], but fails with `QueryTooDeep` as soon as inlining
    /// reaches a field nested deeper than `max_depth`.
    pub fn parse_with_max_depth(
        query: &str,
        operation_name: Option<&str>,
        max_depth: usize,
    ) -> Result<Self, GatewayError> {
        let document = async_graphql_parser::parse_query(query)
            .map_err(|e| GatewayError::ParseFailed(e.to_string()))?;
        Self::from_document(&document, operation_name, max_depth)
    }

    pub fn from_document(
        document: &ExecutableDocument,
        operation_name: Option<&str>,
        max_depth: usize,
    ) -> Result<Self, GatewayError> {
        let (name, operation) = select_operation(&document.operations, operation_name)?;

        let kind = match operation.node.ty {
            OperationType::Query => OperationKind::Query,
            OperationType::Mutation => OperationKind::Mutation,
            OperationType::Subscription => {
                return Err(GatewayError::BadRequest(
                    "Subscriptions are not supported by this gateway".to_string(),
                ))
            }
        };

        let fragments: HashMap<&str, &FragmentDefinition> = document
            .fragments
            .iter()
            .map(|(name, fragment)| (name.as_str(), &fragment.node))
            .collect();

        let mut inliner = Inliner {
            fragments,
            stack: Vec::new(),
            emitted: 0,
            nesting: 0,
            max_depth: max_depth.min(MAX_NESTING),
        };
        let selections = inliner.lower(&operation.node.selection_set.node, 1)?;

        let variables = operation
            .node
            .variable_definitions
            .iter()
            .map(|def| VariableDefinition {
                name: def.node.name.node.to_string(),
                type_ref: def.node.var_type.node.to_string(),
                default_value: def.node.default_value.as_ref().map(|v| v.node.to_string()),
                default: def
                    .node
                    .default_value
                    .as_ref()
                    .and_then(|v| v.node.clone().into_json().ok()),
            })
            .collect();

        Ok(Self {
            kind,
            name,
            variables,
            selections,
        })
    }

    /// Root fields of the operation, with root inline fragments flattened.
    pub fn root_fields(&self) -> Vec<&FieldNode> {
        let mut fields = Vec::new();
        flatten_fields(&self.selections, &mut fields);
        fields
    }

    /// Root fields that survive `@skip`/`@include`, on fields and root inline fragments.
    pub fn executable_root_fields(&self, variables: &Map<String, JsonValue>) -> Vec<&FieldNode> {
        let variables = self.with_defaults(variables);
        let mut fields = Vec::new();
        collect_executable(&self.selections, &variables, &mut fields);
        fields
    }

    /// Request variables plus declared defaults for the ones the request omits.
    pub fn with_defaults(&self, variables: &Map<String, JsonValue>) -> Map<String, JsonValue> {
        let mut merged = variables.clone();
        for definition in &self.variables {
            if let Some(default) = &definition.default {
                merged
                    .entry(definition.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.root_fields().is_empty()
    }
}

fn collect_executable<'a>(
    selections: &'a [SelectionNode],
    variables: &Map<String, JsonValue>,
    out: &mut Vec<&'a FieldNode>,
) {
    for selection in selections {
        match selection {
            SelectionNode::Field(field) if !field.is_skipped(variables) => out.push(field),
            SelectionNode::InlineFragment(fragment)
                if !skipped_by(&fragment.directives, variables) =>
            {
                collect_executable(&fragment.selections, variables, out)
            }
            _ => {}
        }
    }
}

fn skipped_by(directives: &[Directive], variables: &Map<String, JsonValue>) -> bool {
    directives.iter().any(|directive| {
        let condition = directive
            .arguments
            .iter()
            .find(|(name, _)| name == "if")
            .and_then(|(_, value)| resolve_bool(value, variables));
        match (directive.name.as_str(), condition) {
            ("skip", Some(true)) => true,
            ("include", Some(false)) => true,
            _ => false,
        }
    })
}

fn flatten_fields<'a>(selections: &'a [SelectionNode], out: &mut Vec<&'a FieldNode>) {
    for selection in selections {
        match selection {
            SelectionNode::Field(field) => out.push(field),
            SelectionNode::InlineFragment(fragment) => flatten_fields(&fragment.selections, out),
        }
    }
}

fn select_operation<'a>(
    operations: &'a DocumentOperations,
    operation_name: Option<&str>,
) -> Result<(Option<String>, &'a Positioned<OperationDefinition>), GatewayError> {
    match operations {
        DocumentOperations::Single(operation) => Ok((None, operation)),
        DocumentOperations::Multiple(operations) => match operation_name {
            Some(wanted) => operations
                .iter()
                .find(|(name, _)| name.as_str() == wanted)
                .map(|(name, op)| (Some(name.to_string()), op))
                .ok_or_else(|| {
                    GatewayError::ValidationFailed(format!("Unknown operation named \"{}\".", wanted))
                }),
            None if operations.len() == 1 => operations
                .iter()
                .next()
                .map(|(name, op)| (Some(name.to_string()), op))
                .ok_or_else(|| GatewayError::BadRequest("Document contains no operation".into())),
            None => Err(GatewayError::BadRequest(
                "Must provide operation name if query contains multiple operations.".into(),
            )),
        },
    }
}

struct Inliner<'a> {
    fragments: HashMap<&'a str, &'a FragmentDefinition>,
    stack: Vec<String>,
    emitted: usize,
    /// Selection sets currently open, fragments included.
    nesting: usize,
    max_depth: usize,
}

impl<'a> Inliner<'a> {
    /// Lower `set`, whose fields sit at `depth`.
    fn lower(
        &mut self,
        set: &'a SelectionSet,
        depth: usize,
    ) -> Result<Vec<SelectionNode>, GatewayError> {
        if set.items.is_empty() {
            return Ok(Vec::new());
        }
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(GatewayError::ValidationFailed(format!(
                "Operation nests selections more than {} levels deep",
                MAX_NESTING
            )));
        }
        let out = self.lower_items(set, depth);
        self.nesting -= 1;
        out
    }

    fn lower_items(
        &mut self,
        set: &'a SelectionSet,
        depth: usize,
    ) -> Result<Vec<SelectionNode>, GatewayError> {
        let mut out = Vec::with_capacity(set.items.len());
        for item in &set.items {
            self.emitted += 1;
            if self.emitted > MAX_EXPANDED_SELECTIONS {
                return Err(GatewayError::ValidationFailed(format!(
                    "Operation expands to more than {} selections",
                    MAX_EXPANDED_SELECTIONS
                )));
            }

            match &item.node {
                Selection::Field(field) => {
                    if depth > self.max_depth {
                        return Err(GatewayError::QueryTooDeep {
                            actual: depth,
                            max: self.max_depth,
                        });
                    }
                    let field_node = &field.node;
                    out.push(SelectionNode::Field(FieldNode {
                        alias: field_node.alias.as_ref().map(|a| a.node.to_string()),
                        name: field_node.name.node.to_string(),
                        arguments: field_node
                            .arguments
                            .iter()
                            .map(|(name, value)| (name.node.to_string(), value.node.clone()))
                            .collect(),
                        directives: lower_directives(&field_node.directives),
                        selections: self.lower(&field_node.selection_set.node, depth + 1)?,
                        location: Location {
                            line: field.pos.line,
                            column: field.pos.column,
                        },
                    }));
                }
                Selection::InlineFragment(fragment) => {
                    let fragment = &fragment.node;
                    out.push(SelectionNode::InlineFragment(InlineFragmentNode {
                        type_condition: fragment
                            .type_condition
                            .as_ref()
                            .map(|tc| tc.node.on.node.to_string()),
                        directives: lower_directives(&fragment.directives),
                        selections: self.lower(&fragment.selection_set.node, depth)?,
                    }));
                }
                Selection::FragmentSpread(spread) => {
                    let name = spread.node.fragment_name.node.as_str();
                    let definition = *self.fragments.get(name).ok_or_else(|| {
                        GatewayError::ValidationFailed(format!("Unknown fragment \"{}\".", name))
                    })?;
                    if self.stack.iter().any(|n| n == name) {
                        return Err(GatewayError::ValidationFailed(format!(
                            "Cannot spread fragment \"{}\" within itself.",
                            name
                        )));
                    }

                    self.stack.push(name.to_string());
                    let selections = self.lower(&definition.selection_set.node, depth)?;
                    self.stack.pop();

                    out.push(SelectionNode::InlineFragment(InlineFragmentNode {
                        type_condition: Some(definition.type_condition.node.on.node.to_string()),
                        directives: lower_directives(&spread.node.directives),
                        selections,
                    }));
                }
            }
        }
        Ok(out)
    }
}

fn lower_directives(
    directives: &[Positioned<async_graphql_parser::types::Directive>],
) -> Vec<Directive> {
    directives
        .iter()
        .map(|d| Directive {
            name: d.node.name.node.to_string(),
            arguments: d
                .node
                .arguments
                .iter()
                .map(|(name, value)| (name.node.to_string(), value.node.clone()))
                .collect(),
        })
        .collect()
}

fn collect_value_variables(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Variable(name) => {
            out.insert(name.to_string());
        }
        Value::List(items) => {
            for item in items {
                collect_value_variables(item, out);
            }
        }
        Value::Object(fields) => {
            for item in fields.values() {
                collect_value_variables(item, out);
            }
        }
        _ => {}
    }
}

fn resolve_bool(value: &Value, variables: &Map<String, JsonValue>) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        Value::Variable(name) => variables.get(name.as_str()).and_then(JsonValue::as_bool),
        _ => None,
    }
}
