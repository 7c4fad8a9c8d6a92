//! Gateway error kinds and GraphQL-compliant error payloads.
//!
//! Every error that reaches a client is rendered as a GraphQL error object with a
//! stable code in `extensions.code`. Admission rejections abort the whole request;
//! execution errors are scoped to the fields they affect.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Stable error codes surfaced in `errors[].extensions.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimitExceeded,
    QueryTooDeep,
    QueryTooComplex,
    PayloadTooLarge,
    IntrospectionDisabled,
    OriginNotAllowed,
    BadRequest,
    GraphqlParseFailed,
    GraphqlValidationFailed,
    Unauthenticated,
    SubgraphUnavailable,
    InternalServerError,
}

impl ErrorCode {
    /// Get the code as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::QueryTooDeep => "QUERY_TOO_DEEP",
            Self::QueryTooComplex => "QUERY_TOO_COMPLEX",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::IntrospectionDisabled => "INTROSPECTION_DISABLED",
            Self::OriginNotAllowed => "ORIGIN_NOT_ALLOWED",
            Self::BadRequest => "BAD_REQUEST",
            Self::GraphqlParseFailed => "GRAPHQL_PARSE_FAILED",
            Self::GraphqlValidationFailed => "GRAPHQL_VALIDATION_FAILED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::SubgraphUnavailable => "SUBGRAPH_UNAVAILABLE",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the gateway itself.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Too many requests, retry in {retry_after_secs} seconds")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Query depth of {actual} exceeds maximum allowed depth of {max}")]
    QueryTooDeep { actual: usize, max: usize },

    #[error("Query complexity of {actual} exceeds maximum allowed complexity of {max}")]
    QueryTooComplex { actual: u64, max: u64 },

    #[error("{}", payload_message(.actual, .max))]
    PayloadTooLarge { actual: Option<u64>, max: usize },

    #[error("GraphQL introspection is not allowed")]
    IntrospectionDisabled,

    #[error("Origin '{0}' is not allowed")]
    OriginNotAllowed(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Syntax error: {0}")]
    ParseFailed(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("Authentication required to access field '{field}'")]
    Unauthenticated { field: String },

    #[error("Subgraph '{subgraph}' is unavailable")]
    SubgraphUnavailable { subgraph: String, reason: String },

    #[error("{0}")]
    Internal(String),
}

fn payload_message(actual: &Option<u64>, max: &usize) -> String {
    match actual {
        Some(actual) => format!(
            "Request body of {} bytes exceeds maximum allowed size of {} bytes",
            actual, max
        ),
        None => format!("Request body exceeds maximum allowed size of {} bytes", max),
    }
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RateLimitExceeded { .. } => ErrorCode::RateLimitExceeded,
            Self::QueryTooDeep { .. } => ErrorCode::QueryTooDeep,
            Self::QueryTooComplex { .. } => ErrorCode::QueryTooComplex,
            Self::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            Self::IntrospectionDisabled => ErrorCode::IntrospectionDisabled,
            Self::OriginNotAllowed(_) => ErrorCode::OriginNotAllowed,
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::ParseFailed(_) => ErrorCode::GraphqlParseFailed,
            Self::ValidationFailed(_) => ErrorCode::GraphqlValidationFailed,
            Self::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            Self::SubgraphUnavailable { .. } => ErrorCode::SubgraphUnavailable,
            Self::Internal(_) => ErrorCode::InternalServerError,
        }
    }

    /// HTTP status used when this error rejects the whole request.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::QueryTooDeep { .. }
            | Self::QueryTooComplex { .. }
            | Self::IntrospectionDisabled
            | Self::BadRequest(_)
            | Self::ParseFailed(_)
            | Self::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated { .. } | Self::SubgraphUnavailable { .. } => StatusCode::OK,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as a GraphQL error object.
    pub fn to_graphql_error(&self) -> GraphQLError {
        let mut error = GraphQLError::new(self.to_string()).with_code(self.code());
        match self {
            Self::QueryTooDeep { actual, max } => {
                error.extensions.insert("actual".into(), Value::from(*actual as u64));
                error.extensions.insert("max".into(), Value::from(*max as u64));
            }
            Self::QueryTooComplex { actual, max } => {
                error.extensions.insert("actual".into(), Value::from(*actual));
                error.extensions.insert("max".into(), Value::from(*max));
            }
            Self::PayloadTooLarge { actual, max } => {
                if let Some(actual) = actual {
                    error.extensions.insert("actual".into(), Value::from(*actual));
                }
                error.extensions.insert("max".into(), Value::from(*max as u64));
            }
            Self::RateLimitExceeded { retry_after_secs } => {
                error
                    .extensions
                    .insert("retryAfter".into(), Value::from(*retry_after_secs));
            }
            Self::Unauthenticated { field } => {
                error.path = Some(vec![Value::from(field.as_str())]);
            }
            Self::SubgraphUnavailable { subgraph, reason } => {
                error
                    .extensions
                    .insert("serviceName".into(), Value::from(subgraph.as_str()));
                let mut exception = Map::new();
                exception.insert("message".into(), Value::from(reason.as_str()));
                error
                    .extensions
                    .insert("exception".into(), Value::Object(exception));
            }
            _ => {}
        }
        error
    }
}

/// A source location in the GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// A GraphQL error object as found in the `errors` array of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: Map::new(),
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.extensions
            .insert("code".into(), Value::from(code.as_str()));
        self
    }

    /// Scope the error to a root response key.
    pub fn at_root_field(mut self, response_key: &str) -> Self {
        self.path = Some(vec![Value::from(response_key)]);
        self
    }

    /// The `extensions.code` string, if any.
    pub fn code(&self) -> Option<&str> {
        self.extensions.get("code").and_then(Value::as_str)
    }
}

/// A GraphQL response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQLResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl GraphQLResponse {
    /// A response that carries only errors.
    pub fn from_errors(errors: Vec<GraphQLError>) -> Self {
        Self { data: None, errors }
    }
}

impl From<&GatewayError> for GraphQLResponse {
    fn from(err: &GatewayError) -> Self {
        Self::from_errors(vec![err.to_graphql_error()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::QueryTooDeep.to_string(), "QUERY_TOO_DEEP");
        assert_eq!(
            ErrorCode::GraphqlValidationFailed.to_string(),
            "GRAPHQL_VALIDATION_FAILED"
        );
        assert_eq!(
            serde_json::to_value(ErrorCode::RateLimitExceeded).unwrap(),
            json!("RATE_LIMIT_EXCEEDED")
        );
    }

    #[test]
    fn test_depth_error_carries_limits() {
        let err = GatewayError::QueryTooDeep { actual: 11, max: 10 };
        let gql = err.to_graphql_error();
        assert_eq!(gql.code(), Some("QUERY_TOO_DEEP"));
        assert!(gql.message.contains("11"));
        assert_eq!(gql.extensions["actual"], 11);
        assert_eq!(gql.extensions["max"], 10);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_payload_message_without_length() {
        let err = GatewayError::PayloadTooLarge { actual: None, max: 1024 };
        assert_eq!(
            err.to_string(),
            "Request body exceeds maximum allowed size of 1024 bytes"
        );
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(err.to_graphql_error().extensions.get("actual").is_none());
    }

    #[test]
    fn test_subgraph_unavailable_is_field_scoped() {
        let err = GatewayError::SubgraphUnavailable {
            subgraph: "listings".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(err.status(), StatusCode::OK);
        let gql = err.to_graphql_error().at_root_field("featured");
        assert_eq!(gql.path, Some(vec![json!("featured")]));
        assert_eq!(gql.extensions["serviceName"], "listings");
        assert_eq!(
            gql.extensions["exception"]["message"],
            "connection refused"
        );
    }

    #[test]
    fn test_response_serialization_skips_empty_parts() {
        let response = GraphQLResponse::from(&GatewayError::IntrospectionDisabled);
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("data").is_none());
        assert_eq!(value["errors"][0]["extensions"]["code"], "INTROSPECTION_DISABLED");
        assert!(value["errors"][0].get("locations").is_none());
    }

    #[test]
    fn test_subgraph_response_deserializes() {
        let body = json!({
            "data": { "me": null },
            "errors": [{
                "message": "boom",
                "locations": [{ "line": 1, "column": 3 }],
                "path": ["me"],
                "extensions": { "code": "FORBIDDEN" }
            }]
        });
        let response: GraphQLResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.errors[0].code(), Some("FORBIDDEN"));
        assert_eq!(response.errors[0].locations[0].column, 3);
    }
}
