//! GraphQL response construction.
//!
//! # Design Decisions
//! - Every body is a GraphQL response object, including rejections
//! - Rate limit rejections carry `Retry-After`
//! - Execution results are 200 even when they carry field errors

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::{GatewayError, GraphQLResponse};
use crate::security::ErrorMasker;

pub fn graphql_response(status: StatusCode, body: GraphQLResponse) -> Response {
    (status, Json(body)).into_response()
}

/// Whole-request rejection without masking.
pub fn error_response(err: &GatewayError) -> Response {
    with_retry_after(err, graphql_response(err.status(), GraphQLResponse::from(err)))
}

/// Whole-request rejection, masked for the current mode.
pub fn rejection_response(err: &GatewayError, masker: &ErrorMasker) -> Response {
    let body = GraphQLResponse::from_errors(vec![masker.mask(err.to_graphql_error())]);
    with_retry_after(err, graphql_response(err.status(), body))
}

fn with_retry_after(err: &GatewayError, mut response: Response) -> Response {
    if let GatewayError::RateLimitExceeded { retry_after_secs } = err {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
    }
    response
}
