//! Weighted query cost with list amplification.
//!
//! `cost(field) = field_cost + multiplier × Σ cost(children)`, where the multiplier is 1
//! for scalar/object fields and the page size (or the default list multiplier) for
//! list-producing fields. Aliases are costed independently.

use async_graphql_value::Value;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;

use crate::config::ComplexityRules;
use crate::error::GatewayError;
use crate::query::shape::{FieldNode, QueryShape, SelectionNode};

/// Computes operation cost from the configured rules plus list fields discovered
/// during composition.
pub struct ComplexityAnalyzer<'a> {
    rules: &'a ComplexityRules,
    discovered_list_fields: &'a HashSet<String>,
    variables: &'a Map<String, JsonValue>,
}

impl<'a> ComplexityAnalyzer<'a> {
    pub fn new(
        rules: &'a ComplexityRules,
        discovered_list_fields: &'a HashSet<String>,
        variables: &'a Map<String, JsonValue>,
    ) -> Self {
        Self {
            rules,
            discovered_list_fields,
            variables,
        }
    }

    pub fn cost(&self, shape: &QueryShape) -> u64 {
        self.selections_cost(&shape.selections)
    }

    fn selections_cost(&self, selections: &[SelectionNode]) -> u64 {
        selections.iter().fold(0u64, |total, selection| {
            let cost = match selection {
                SelectionNode::Field(field) => self.field_cost(field),
                SelectionNode::InlineFragment(fragment) => {
                    self.selections_cost(&fragment.selections)
                }
            };
            total.saturating_add(cost)
        })
    }

    fn field_cost(&self, field: &FieldNode) -> u64 {
        let own = self.rules.field_cost(&field.name);
        if field.selections.is_empty() {
            return own;
        }
        let children = self.selections_cost(&field.selections);
        own.saturating_add(self.multiplier(field).saturating_mul(children))
    }

    fn multiplier(&self, field: &FieldNode) -> u64 {
        let size_argument = self
            .rules
            .list_size_arguments
            .iter()
            .find_map(|name| field.argument(name));

        if let Some(value) = size_argument {
            return self
                .page_size(value)
                .unwrap_or(self.rules.default_list_multiplier);
        }

        if self.rules.list_fields.contains(&field.name)
            || self.discovered_list_fields.contains(&field.name)
        {
            self.rules.default_list_multiplier
        } else {
            1
        }
    }

    fn page_size(&self, value: &Value) -> Option<u64> {
        match value {
            Value::Number(n) => n.as_u64(),
            Value::Variable(name) => self.variables.get(name.as_str()).and_then(JsonValue::as_u64),
            _ => None,
        }
    }
}

/// Reject the operation when its cost exceeds `max_complexity`.
pub fn check_complexity(
    analyzer: &ComplexityAnalyzer<'_>,
    shape: &QueryShape,
    max_complexity: u64,
) -> Result<u64, GatewayError> {
    let cost = analyzer.cost(shape);
    if cost > max_complexity {
        return Err(GatewayError::QueryTooComplex {
            actual: cost,
            max: max_complexity,
        });
    }
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use serde_json::json;

    fn rules() -> ComplexityRules {
        let mut rules = SecurityConfig::default().complexity;
        rules.list_fields.insert("listings".to_string());
        rules
    }

    fn cost_of(query: &str, variables: JsonValue) -> u64 {
        let rules = rules();
        let discovered = HashSet::new();
        let variables = variables.as_object().cloned().unwrap_or_default();
        let shape = QueryShape::parse(query, None).unwrap();
        ComplexityAnalyzer::new(&rules, &discovered, &variables).cost(&shape)
    }

    fn aliased_listings(copies: usize) -> String {
        let leaves = (0..11).map(|i| format!("f{}", i)).collect::<Vec<_>>().join(" ");
        let fields = (0..copies)
            .map(|i| format!("l{}: listings {{ {} }}", i, leaves))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{{ {} }}", fields)
    }

    #[test]
    fn test_scalar_fields_cost_one_each() {
        assert_eq!(cost_of("{ me { id name } }", json!({})), 3);
    }

    #[test]
    fn test_list_fields_multiply_children() {
        // 1 + 10 × 2
        assert_eq!(cost_of("{ listings { id title } }", json!({})), 21);
    }

    #[test]
    fn test_page_size_argument_overrides_default() {
        assert_eq!(cost_of("{ bookings(first: 3) { id } }", json!({})), 4);
        assert_eq!(
            cost_of("query Q($n: Int) { bookings(limit: $n) { id } }", json!({ "n": 50 })),
            51
        );
        // unresolved variable falls back to the default multiplier
        assert_eq!(cost_of("query Q($n: Int) { bookings(limit: $n) { id } }", json!({})), 11);
    }

    #[test]
    fn test_discovered_list_fields_amplify() {
        let rules = SecurityConfig::default().complexity;
        let discovered: HashSet<String> = ["reviews".to_string()].into_iter().collect();
        let variables = Map::new();
        let shape = QueryShape::parse("{ reviews { id } }", None).unwrap();
        assert_eq!(
            ComplexityAnalyzer::new(&rules, &discovered, &variables).cost(&shape),
            11
        );
    }

    #[test]
    fn test_aliases_are_counted_independently() {
        let rules = rules();
        let discovered = HashSet::new();
        let variables = Map::new();

        let nine = QueryShape::parse(&aliased_listings(9), None).unwrap();
        let analyzer = ComplexityAnalyzer::new(&rules, &discovered, &variables);
        assert_eq!(check_complexity(&analyzer, &nine, 1000).unwrap(), 999);

        let eleven = QueryShape::parse(&aliased_listings(11), None).unwrap();
        assert_eq!(
            check_complexity(&analyzer, &eleven, 1000).unwrap_err(),
            GatewayError::QueryTooComplex { actual: 1221, max: 1000 }
        );
    }

    #[test]
    fn test_configured_field_cost() {
        let mut rules = rules();
        rules.field_costs.insert("search".to_string(), 25);
        let discovered = HashSet::new();
        let variables = Map::new();
        let shape = QueryShape::parse("{ search { id } }", None).unwrap();
        assert_eq!(
            ComplexityAnalyzer::new(&rules, &discovered, &variables).cost(&shape),
            26
        );
    }
}
