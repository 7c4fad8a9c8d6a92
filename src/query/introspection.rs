//! Introspection detection and gating.

use crate::config::EnvironmentMode;
use crate::error::GatewayError;
use crate::query::shape::QueryShape;

pub const SCHEMA_FIELD: &str = "__schema";
pub const TYPE_FIELD: &str = "__type";
pub const TYPENAME_FIELD: &str = "__typename";

/// Whether a root field name is schema introspection. `__typename` is not.
pub fn is_introspection_field(name: &str) -> bool {
    name == SCHEMA_FIELD || name == TYPE_FIELD
}

pub fn is_introspection(shape: &QueryShape) -> bool {
    shape
        .root_fields()
        .iter()
        .any(|field| is_introspection_field(&field.name))
}

/// Production rejects introspection; development allows it.
pub fn check_introspection(shape: &QueryShape, mode: EnvironmentMode) -> Result<(), GatewayError> {
    if mode.is_production() && is_introspection(shape) {
        return Err(GatewayError::IntrospectionDisabled);
    }
    Ok(())
}
