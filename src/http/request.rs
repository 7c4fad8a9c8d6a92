//! Request identity and caller context.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4) unless the caller sent one
//! - Resolve the client identity used for rate limiting
//! - Extract the caller's forwarded identity (token, user id, role)
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Forwarded-for headers are ignored unless explicitly trusted
//! - Context is built per request and never stored

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};
use std::net::SocketAddr;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Per-request caller context, passed through execution to the forwarder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub client_identity: String,
    pub request_id: Option<String>,
    pub auth_token: Option<String>,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> Self {
        Self {
            client_identity: client_identity(headers, peer, trust_forwarded_for),
            request_id: header_str(headers, &X_REQUEST_ID),
            auth_token: bearer_token(headers),
            user_id: header_str(headers, &X_USER_ID),
            user_role: header_str(headers, &X_USER_ROLE),
        }
    }

    /// Whether the caller presented any identity.
    pub fn is_authenticated(&self) -> bool {
        self.auth_token.is_some() || self.user_id.is_some()
    }
}

/// Source address, or the first forwarded address when trusted.
pub fn client_identity(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = header_str(headers, &X_FORWARDED_FOR)
            .and_then(|v| v.split(',').next().map(|first| first.trim().to_string()))
            .filter(|v| !v.is_empty());
        if let Some(addr) = forwarded.or_else(|| header_str(headers, &X_REAL_IP)) {
            return addr;
        }
    }
    peer.ip().to_string()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, &header::AUTHORIZATION)?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
