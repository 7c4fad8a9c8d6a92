//! Authenticated subgraph calls.
//!
//! Every outbound request carries the caller's identity from the [`RequestContext`]
//! (never from global state) and the request ID. Each call has its own deadline.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time;

use crate::error::GraphQLResponse;
use crate::http::request::{RequestContext, X_REQUEST_ID, X_USER_ID, X_USER_ROLE};

/// Why a subgraph call produced no usable GraphQL response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ForwardError {
    /// Whether the failure says something about the subgraph's health.
    pub fn is_health_failure(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport(_) | Self::InvalidResponse(_) => true,
            Self::Status(status) => *status >= 500,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Transport(_) => "transport_error",
            Self::Status(_) => "http_error",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Request body sent to a subgraph.
#[derive(Debug, Clone, Serialize)]
pub struct SubgraphRequest {
    pub query: String,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("federation-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST a GraphQL request to `url` with the default deadline.
    pub async fn send(
        &self,
        url: &str,
        request: &SubgraphRequest,
        context: Option<&RequestContext>,
    ) -> Result<GraphQLResponse, ForwardError> {
        self.send_with_timeout(url, request, context, self.timeout)
            .await
    }

    pub async fn send_with_timeout(
        &self,
        url: &str,
        request: &SubgraphRequest,
        context: Option<&RequestContext>,
        timeout: Duration,
    ) -> Result<GraphQLResponse, ForwardError> {
        let call = async {
            let response = self
                .client
                .post(url)
                .headers(identity_headers(context))
                .json(request)
                .send()
                .await
                .map_err(|e| ForwardError::Transport(e.to_string()))?;

            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| ForwardError::Transport(e.to_string()))?;

            match serde_json::from_slice::<GraphQLResponse>(&body) {
                // GraphQL servers report validation failures as 4xx with a regular body.
                Ok(parsed) if status.is_success() || status.is_client_error() => Ok(parsed),
                Ok(_) => Err(ForwardError::Status(status.as_u16())),
                Err(_) if !status.is_success() => Err(ForwardError::Status(status.as_u16())),
                Err(e) => Err(ForwardError::InvalidResponse(e.to_string())),
            }
        };

        match time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ForwardError::Timeout {
                after_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Identity headers for an outbound call; each only when present on the context.
pub fn identity_headers(context: Option<&RequestContext>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let Some(ctx) = context else {
        return headers;
    };

    let pairs = [
        (X_USER_ID, ctx.user_id.clone()),
        (X_USER_ROLE, ctx.user_role.clone()),
        (AUTHORIZATION, ctx.auth_token.as_ref().map(|t| format!("Bearer {}", t))),
        (X_REQUEST_ID, ctx.request_id.clone()),
    ];
    for (name, value) in pairs {
        if let Some(value) = value.and_then(|v| HeaderValue::from_str(&v).ok()) {
            headers.insert(name, value);
        }
    }
    headers
}
