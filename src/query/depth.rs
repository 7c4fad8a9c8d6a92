//! Selection-set nesting depth.

use crate::error::GatewayError;
use crate::query::shape::{QueryShape, SelectionNode};

/// Maximum nesting of the operation's selection sets.
///
/// A query with only leaf root fields has depth 1; an operation with no fields has depth 0.
/// Inline fragments (including inlined spreads) do not add a level.
pub fn query_depth(shape: &QueryShape) -> usize {
    selection_depth(&shape.selections)
}

fn selection_depth(selections: &[SelectionNode]) -> usize {
    selections
        .iter()
        .map(|selection| match selection {
            SelectionNode::Field(field) => 1 + selection_depth(&field.selections),
            SelectionNode::InlineFragment(fragment) => selection_depth(&fragment.selections),
        })
        .max()
        .unwrap_or(0)
}

/// Reject the operation when it nests deeper than `max_depth`.
pub fn check_depth(shape: &QueryShape, max_depth: usize) -> Result<usize, GatewayError> {
    let depth = query_depth(shape);
    if depth > max_depth {
        return Err(GatewayError::QueryTooDeep {
            actual: depth,
            max: max_depth,
        });
    }
    Ok(depth)
}
