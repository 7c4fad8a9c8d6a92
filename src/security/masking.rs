//! Outbound error masking.
//!
//! Development passes errors through untouched. Production keeps the code and message of
//! client-facing errors but strips internal extensions, and replaces everything else with
//! a generic internal error. The original detail is logged server-side only.

use crate::config::EnvironmentMode;
use crate::error::{ErrorCode, GraphQLError};

pub const GENERIC_MESSAGE: &str = "Internal server error";

/// Extensions that may leak internals.
const INTERNAL_EXTENSIONS: &[&str] = &["exception", "stacktrace"];

/// Codes that are safe to show to clients, including common subgraph codes.
const CLIENT_FACING_CODES: &[&str] = &[
    "RATE_LIMIT_EXCEEDED",
    "QUERY_TOO_DEEP",
    "QUERY_TOO_COMPLEX",
    "PAYLOAD_TOO_LARGE",
    "INTROSPECTION_DISABLED",
    "ORIGIN_NOT_ALLOWED",
    "BAD_REQUEST",
    "GRAPHQL_PARSE_FAILED",
    "GRAPHQL_VALIDATION_FAILED",
    "BAD_USER_INPUT",
    "UNAUTHENTICATED",
    "FORBIDDEN",
    "SUBGRAPH_UNAVAILABLE",
    "PERSISTED_QUERY_NOT_FOUND",
];

pub fn is_client_facing(code: &str) -> bool {
    CLIENT_FACING_CODES.contains(&code)
}

#[derive(Debug, Clone, Copy)]
pub struct ErrorMasker {
    mode: EnvironmentMode,
}

impl ErrorMasker {
    pub fn new(mode: EnvironmentMode) -> Self {
        Self { mode }
    }

    pub fn mask(&self, error: GraphQLError) -> GraphQLError {
        if !self.mode.is_production() {
            return error;
        }

        match error.code() {
            Some(code) if is_client_facing(code) => {
                let mut error = error;
                for key in INTERNAL_EXTENSIONS {
                    error.extensions.remove(*key);
                }
                error
            }
            code => {
                tracing::error!(
                    code = code.unwrap_or("<none>"),
                    message = %error.message,
                    extensions = ?error.extensions,
                    "Masked internal error"
                );
                let mut masked =
                    GraphQLError::new(GENERIC_MESSAGE).with_code(ErrorCode::InternalServerError);
                masked.path = error.path;
                masked.locations = error.locations;
                masked
            }
        }
    }

    pub fn mask_all(&self, errors: Vec<GraphQLError>) -> Vec<GraphQLError> {
        errors.into_iter().map(|e| self.mask(e)).collect()
    }
}
