//! CORS origin policy and protective response headers.
//!
//! # Design Decisions
//! - Security headers are set by a router layer so rejected responses carry them too
//! - Requests without `Origin` are same-origin or non-browser and pass
//! - Allowed origins are echoed back rather than answered with `*`

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::AllowedOrigins;
use crate::error::GatewayError;
use crate::http::response::error_response;

pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
pub const ALLOWED_REQUEST_HEADERS: &str =
    "content-type, authorization, x-user-id, x-user-role, x-request-id";
const PREFLIGHT_MAX_AGE_SECS: &str = "600";

/// Add `nosniff`, `DENY` framing and `no-referrer` to every response of `router`.
pub fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
}

/// Validate the `Origin` header. Returns the origin to echo, if any.
pub fn check_origin(
    headers: &HeaderMap,
    allowed: &AllowedOrigins,
) -> Result<Option<HeaderValue>, GatewayError> {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return Ok(None);
    };
    let value = origin
        .to_str()
        .map_err(|_| GatewayError::OriginNotAllowed("<non-ascii>".to_string()))?;

    if allowed.allows(value) {
        Ok(Some(origin.clone()))
    } else {
        tracing::warn!(origin = %value, "Rejected request from disallowed origin");
        Err(GatewayError::OriginNotAllowed(value.to_string()))
    }
}

/// Decorate a response for an allowed cross-origin caller.
pub fn apply_cors(headers: &mut HeaderMap, origin: Option<&HeaderValue>) {
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
    if let Some(origin) = origin {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}

/// Answer an `OPTIONS` preflight: 204 when the origin is allowed, 403 otherwise.
pub fn preflight_response(request_headers: &HeaderMap, allowed: &AllowedOrigins) -> Response {
    match check_origin(request_headers, allowed) {
        Ok(origin) => {
            let mut response = StatusCode::NO_CONTENT.into_response();
            let headers = response.headers_mut();
            apply_cors(headers, origin.as_ref());
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_REQUEST_HEADERS),
            );
            headers.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
            );
            response
        }
        Err(err) => error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn allow_list() -> AllowedOrigins {
        AllowedOrigins::List(
            ["https://app.example.com".to_string()]
                .into_iter()
                .collect::<HashSet<_>>(),
        )
    }

    fn with_origin(origin: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static(origin));
        headers
    }

    #[test]
    fn test_missing_origin_passes() {
        assert_eq!(check_origin(&HeaderMap::new(), &allow_list()).unwrap(), None);
    }

    #[test]
    fn test_origin_list() {
        let allowed = allow_list();
        assert!(check_origin(&with_origin("https://app.example.com"), &allowed)
            .unwrap()
            .is_some());
        assert_eq!(
            check_origin(&with_origin("https://evil.example.com"), &allowed).unwrap_err(),
            GatewayError::OriginNotAllowed("https://evil.example.com".to_string())
        );
        assert!(check_origin(&with_origin("https://evil.example.com"), &AllowedOrigins::Any)
            .is_ok());
    }

    #[test]
    fn test_preflight() {
        let ok = preflight_response(&with_origin("https://app.example.com"), &allow_list());
        assert_eq!(ok.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            ok.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
        assert_eq!(ok.headers()[header::VARY], "Origin");

        let denied = preflight_response(&with_origin("https://evil.example.com"), &allow_list());
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    }
}
