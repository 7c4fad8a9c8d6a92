//! Admission control.
//!
//! # Data Flow
//! ```text
//! Header phase (before any body byte is read):
//!     SizeGuard (declared Content-Length)
//!     → OriginPolicy (CORS allow-list)
//!     → RateLimit (fixed window per client)
//!
//! Body read with a hard byte cap
//!
//! Document phase (before any subgraph is touched):
//!     Parse (JSON envelope, GraphQL document, fragment inlining)
//!     → Depth
//!     → Complexity
//!     → Introspection
//! ```
//!
//! # Design Decisions
//! - Every stage has the same contract and runs synchronously
//! - The first failing stage ends admission; later stages never run
//! - Stages record what they learned (depth, cost, origin) on the context

pub mod stages;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::SecurityConfig;
use crate::error::GatewayError;
use crate::gateway::Supergraph;
use crate::http::request::RequestContext;
use crate::query::QueryShape;
use crate::security::RateLimiter;

pub use stages::{
    ComplexityStage, DepthStage, IntrospectionStage, OriginPolicy, ParseStage, RateLimitStage,
    SizeGuard,
};

/// Outcome of one stage.
pub type Verdict = Result<(), GatewayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Headers,
    Document,
}

/// JSON envelope of `POST /graphql`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphQLRequest {
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,

    #[serde(default)]
    pub variables: Option<Map<String, Value>>,
}

/// Everything admission knows about one request.
pub struct AdmissionContext {
    pub headers: HeaderMap,
    pub request: RequestContext,
    pub supergraph: Arc<Supergraph>,

    pub origin: Option<HeaderValue>,
    pub declared_length: Option<u64>,
    pub body: Bytes,

    pub operation_name: Option<String>,
    pub variables: Map<String, Value>,
    pub shape: Option<QueryShape>,
    pub depth: Option<usize>,
    pub complexity: Option<u64>,
}

impl AdmissionContext {
    pub fn new(headers: HeaderMap, request: RequestContext, supergraph: Arc<Supergraph>) -> Self {
        Self {
            headers,
            request,
            supergraph,
            origin: None,
            declared_length: None,
            body: Bytes::new(),
            operation_name: None,
            variables: Map::new(),
            shape: None,
            depth: None,
            complexity: None,
        }
    }

    /// The parsed operation. Only available once the parse stage has run.
    pub fn shape(&self) -> Result<&QueryShape, GatewayError> {
        self.shape
            .as_ref()
            .ok_or_else(|| GatewayError::Internal("operation has not been parsed".to_string()))
    }
}

/// One admission check.
pub trait AdmissionStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn phase(&self) -> Phase;

    fn check(&self, ctx: &mut AdmissionContext) -> Verdict;
}

/// Ordered list of stages.
#[derive(Default)]
pub struct AdmissionPipeline {
    stages: Vec<Box<dyn AdmissionStage>>,
}

impl AdmissionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: impl AdmissionStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Size, origin and rate checks, then parse, depth, complexity and introspection.
    pub fn standard(security: Arc<SecurityConfig>, limiter: Arc<RateLimiter>) -> Self {
        Self::new()
            .with_stage(SizeGuard::new(security.clone()))
            .with_stage(OriginPolicy::new(security.clone()))
            .with_stage(RateLimitStage::new(security.clone(), limiter))
            .with_stage(ParseStage::new(security.clone()))
            .with_stage(DepthStage::new(security.clone()))
            .with_stage(ComplexityStage::new(security.clone()))
            .with_stage(IntrospectionStage::new(security))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage of `phase` in order, stopping at the first rejection.
    pub fn run_phase(&self, phase: Phase, ctx: &mut AdmissionContext) -> Verdict {
        for stage in self.stages.iter().filter(|s| s.phase() == phase) {
            if let Err(err) = stage.check(ctx) {
                tracing::debug!(
                    stage = stage.name(),
                    code = err.code().as_str(),
                    client = %ctx.request.client_identity,
                    "Request rejected by admission"
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AllowedOrigins, EnvironmentMode};
    use axum::http::header;
    use std::time::Duration;

    fn pipeline(security: SecurityConfig) -> AdmissionPipeline {
        let security = Arc::new(security);
        let limiter = Arc::new(RateLimiter::from_security(&security));
        AdmissionPipeline::standard(security, limiter)
    }

    fn context(body: &str) -> AdmissionContext {
        let mut ctx = AdmissionContext::new(
            HeaderMap::new(),
            RequestContext {
                client_identity: "1.2.3.4".to_string(),
                ..RequestContext::default()
            },
            Arc::new(Supergraph::degraded()),
        );
        ctx.body = Bytes::from(body.to_string());
        ctx
    }

    fn admit(pipeline: &AdmissionPipeline, ctx: &mut AdmissionContext) -> Verdict {
        pipeline.run_phase(Phase::Headers, ctx)?;
        pipeline.run_phase(Phase::Document, ctx)
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(
            pipeline(SecurityConfig::default()).stage_names(),
            vec![
                "size_guard",
                "origin_policy",
                "rate_limit",
                "parse",
                "depth",
                "complexity",
                "introspection"
            ]
        );
    }

    #[test]
    fn test_admits_simple_query() {
        let pipeline = pipeline(SecurityConfig::default());
        let mut ctx = context(r#"{"query":"{ health { status } }"}"#);
        admit(&pipeline, &mut ctx).unwrap();
        assert_eq!(ctx.depth, Some(2));
        assert_eq!(ctx.complexity, Some(2));
        assert!(ctx.shape.is_some());
    }

    #[test]
    fn test_depth_checked_before_introspection() {
        let pipeline = pipeline(SecurityConfig {
            mode: EnvironmentMode::Production,
            max_query_depth: 2,
            ..SecurityConfig::default()
        });
        let mut ctx = context(r#"{"query":"{ __schema { types { fields { name } } } }"}"#);
        let err = admit(&pipeline, &mut ctx).unwrap_err();
        assert!(matches!(err, GatewayError::QueryTooDeep { actual: 3, max: 2 }));
    }

    #[test]
    fn test_header_phase_stops_before_parse() {
        let pipeline = pipeline(SecurityConfig {
            rate_limit_max: 1,
            rate_limit_window: Duration::from_secs(60),
            allowed_origins: AllowedOrigins::List(
                ["https://app.example.com".to_string()].into_iter().collect(),
            ),
            ..SecurityConfig::default()
        });

        let mut ctx = context("not json");
        ctx.headers
            .insert(header::ORIGIN, HeaderValue::from_static("https://evil.example.com"));
        let err = pipeline.run_phase(Phase::Headers, &mut ctx).unwrap_err();
        assert!(matches!(err, GatewayError::OriginNotAllowed(_)));
        assert!(ctx.shape.is_none());

        let mut first = context("");
        pipeline.run_phase(Phase::Headers, &mut first).unwrap();
        let mut second = context("");
        let err = pipeline.run_phase(Phase::Headers, &mut second).unwrap_err();
        assert!(matches!(err, GatewayError::RateLimitExceeded { .. }));
    }
}
