//! Request body size limits.
//!
//! # Design Decisions
//! - Declared `Content-Length` is checked before any byte is read
//! - The body is then read with a hard cap, so a missing or lying length is cut off too
//! - Nothing is parsed until the whole body is known to fit

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap};
use http_body_util::LengthLimitError;

use crate::error::GatewayError;

/// Reject a request whose declared length exceeds `max`.
///
/// Returns the declared length when present and parseable.
pub fn check_declared_length(headers: &HeaderMap, max: usize) -> Result<Option<u64>, GatewayError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    match declared {
        Some(length) if length > max as u64 => Err(GatewayError::PayloadTooLarge {
            actual: Some(length),
            max,
        }),
        other => Ok(other),
    }
}

/// Read the body, failing as soon as more than `max` bytes have arrived.
///
/// An overrun maps to `PayloadTooLarge`; any other read failure is a bad request.
pub async fn read_body_capped(body: Body, max: usize) -> Result<Bytes, GatewayError> {
    axum::body::to_bytes(body, max).await.map_err(|e| {
        let source = e.into_inner();
        if source.downcast_ref::<LengthLimitError>().is_some() {
            GatewayError::PayloadTooLarge { actual: None, max }
        } else {
            tracing::debug!(error = %source, "Failed to read request body");
            GatewayError::BadRequest("Failed to read request body".to_string())
        }
    })
}
