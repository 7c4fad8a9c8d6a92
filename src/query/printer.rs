//! Renders query shapes back to GraphQL text for subgraph calls.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::query::shape::{Directive, FieldNode, OperationKind, SelectionNode, VariableDefinition};

/// Print an operation containing `fields` as its root selections.
///
/// Only the variable definitions referenced by those fields are declared.
pub fn print_operation(
    kind: OperationKind,
    name: Option<&str>,
    definitions: &[VariableDefinition],
    fields: &[&FieldNode],
) -> String {
    let used = used_variables(fields);
    let declared: Vec<&VariableDefinition> = definitions
        .iter()
        .filter(|def| used.contains(&def.name))
        .collect();

    let mut out = String::from(kind.as_str());
    if let Some(name) = name {
        out.push(' ');
        out.push_str(name);
    }
    if !declared.is_empty() {
        out.push('(');
        for (i, def) in declared.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "${}: {}", def.name, def.type_ref);
            if let Some(default) = &def.default_value {
                let _ = write!(out, " = {}", default);
            }
        }
        out.push(')');
    }

    out.push_str(" {");
    for field in fields {
        out.push(' ');
        print_field(field, &mut out);
    }
    out.push_str(" }");
    out
}

/// Variables referenced by `fields`.
pub fn used_variables(fields: &[&FieldNode]) -> BTreeSet<String> {
    let mut used = BTreeSet::new();
    for field in fields {
        field.collect_variables(&mut used);
    }
    used
}

fn print_field(field: &FieldNode, out: &mut String) {
    if let Some(alias) = &field.alias {
        out.push_str(alias);
        out.push_str(": ");
    }
    out.push_str(&field.name);
    print_arguments(&field.arguments, out);
    print_directives(&field.directives, out);
    print_selections(&field.selections, out);
}

fn print_selections(selections: &[SelectionNode], out: &mut String) {
    if selections.is_empty() {
        return;
    }
    out.push_str(" {");
    for selection in selections {
        out.push(' ');
        match selection {
            SelectionNode::Field(field) => print_field(field, out),
            SelectionNode::InlineFragment(fragment) => {
                out.push_str("...");
                if let Some(type_condition) = &fragment.type_condition {
                    out.push_str(" on ");
                    out.push_str(type_condition);
                }
                print_directives(&fragment.directives, out);
                print_selections(&fragment.selections, out);
            }
        }
    }
    out.push_str(" }");
}

fn print_arguments(arguments: &[(String, async_graphql_value::Value)], out: &mut String) {
    if arguments.is_empty() {
        return;
    }
    out.push('(');
    for (i, (name, value)) in arguments.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}: {}", name, value);
    }
    out.push(')');
}

fn print_directives(directives: &[Directive], out: &mut String) {
    for directive in directives {
        out.push_str(" @");
        out.push_str(&directive.name);
        print_arguments(&directive.arguments, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::shape::QueryShape;

    #[test]
    fn test_prints_subset_with_used_variables() {
        let shape = QueryShape::parse(
            r#"query Home($id: ID!, $n: Int = 5) {
                me { id name }
                listings(first: $n, city: "Lisbon") { ...Card }
            }
            fragment Card on Listing { title }"#,
            None,
        )
        .unwrap();
        let roots = shape.root_fields();

        let printed = print_operation(shape.kind, Some("Home"), &shape.variables, &roots[1..]);
        assert_eq!(
            printed,
            r#"query Home($n: Int = 5) { listings(first: $n, city: "Lisbon") { ... on Listing { title } } }"#
        );

        let printed = print_operation(shape.kind, None, &shape.variables, &roots[..1]);
        assert_eq!(printed, "query { me { id name } }");
    }

    #[test]
    fn test_printed_operation_reparses() {
        let source = r#"mutation Book($input: BookingInput!) {
            b: createBooking(input: $input) @include(if: true) { id status }
        }"#;
        let shape = QueryShape::parse(source, None).unwrap();
        let printed = print_operation(shape.kind, None, &shape.variables, &shape.root_fields());
        let reparsed = QueryShape::parse(&printed, None).unwrap();

        assert_eq!(reparsed.kind, OperationKind::Mutation);
        assert_eq!(reparsed.selections.len(), 1);
        assert_eq!(reparsed.root_fields()[0].response_key(), "b");
        assert_eq!(reparsed.variables[0].type_ref, "BookingInput!");
    }
}
