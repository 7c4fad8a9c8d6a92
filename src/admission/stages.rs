//! The standard admission stages.

use std::sync::Arc;

use crate::admission::{AdmissionContext, AdmissionStage, GraphQLRequest, Phase, Verdict};
use crate::config::SecurityConfig;
use crate::error::GatewayError;
use crate::query::{check_complexity, check_depth, check_introspection, ComplexityAnalyzer, QueryShape};
use crate::security::headers::check_origin;
use crate::security::limits::check_declared_length;
use crate::security::rate_limit::client_key;
use crate::security::RateLimiter;

/// Rejects a declared `Content-Length` above the ceiling.
pub struct SizeGuard {
    security: Arc<SecurityConfig>,
}

impl SizeGuard {
    pub fn new(security: Arc<SecurityConfig>) -> Self {
        Self { security }
    }
}

impl AdmissionStage for SizeGuard {
    fn name(&self) -> &'static str {
        "size_guard"
    }

    fn phase(&self) -> Phase {
        Phase::Headers
    }

    fn check(&self, ctx: &mut AdmissionContext) -> Verdict {
        ctx.declared_length = check_declared_length(&ctx.headers, self.security.max_request_bytes)?;
        Ok(())
    }
}

pub struct OriginPolicy {
    security: Arc<SecurityConfig>,
}

impl OriginPolicy {
    pub fn new(security: Arc<SecurityConfig>) -> Self {
        Self { security }
    }
}

impl AdmissionStage for OriginPolicy {
    fn name(&self) -> &'static str {
        "origin_policy"
    }

    fn phase(&self) -> Phase {
        Phase::Headers
    }

    fn check(&self, ctx: &mut AdmissionContext) -> Verdict {
        ctx.origin = check_origin(&ctx.headers, &self.security.allowed_origins)?;
        Ok(())
    }
}

pub struct RateLimitStage {
    security: Arc<SecurityConfig>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitStage {
    pub fn new(security: Arc<SecurityConfig>, limiter: Arc<RateLimiter>) -> Self {
        Self { security, limiter }
    }
}

impl AdmissionStage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn phase(&self) -> Phase {
        Phase::Headers
    }

    fn check(&self, ctx: &mut AdmissionContext) -> Verdict {
        let key = client_key(
            &ctx.request.client_identity,
            ctx.request.user_id.as_deref(),
            self.security.rate_limit_key,
        );
        self.limiter.check(&key)?;
        Ok(())
    }
}

/// Decodes the JSON envelope and builds the fragment-free operation.
///
/// Inlining already stops at the depth ceiling, so a fragment chain cannot nest
/// past it before [`DepthStage`] runs.
pub struct ParseStage {
    security: Arc<SecurityConfig>,
}

impl ParseStage {
    pub fn new(security: Arc<SecurityConfig>) -> Self {
        Self { security }
    }
}

impl AdmissionStage for ParseStage {
    fn name(&self) -> &'static str {
        "parse"
    }

    fn phase(&self) -> Phase {
        Phase::Document
    }

    fn check(&self, ctx: &mut AdmissionContext) -> Verdict {
        let request: GraphQLRequest = serde_json::from_slice(&ctx.body).map_err(|e| {
            GatewayError::BadRequest(format!("Request body is not a valid GraphQL request: {}", e))
        })?;

        let query = request
            .query
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| GatewayError::BadRequest("Must provide query string".to_string()))?;

        let shape = QueryShape::parse_with_max_depth(
            &query,
            request.operation_name.as_deref(),
            self.security.max_query_depth,
        )?;
        ctx.operation_name = shape.name.clone().or(request.operation_name);
        ctx.variables = shape.with_defaults(&request.variables.unwrap_or_default());
        ctx.shape = Some(shape);
        Ok(())
    }
}

pub struct DepthStage {
    security: Arc<SecurityConfig>,
}

impl DepthStage {
    pub fn new(security: Arc<SecurityConfig>) -> Self {
        Self { security }
    }
}

impl AdmissionStage for DepthStage {
    fn name(&self) -> &'static str {
        "depth"
    }

    fn phase(&self) -> Phase {
        Phase::Document
    }

    fn check(&self, ctx: &mut AdmissionContext) -> Verdict {
        let depth = check_depth(ctx.shape()?, self.security.max_query_depth)?;
        ctx.depth = Some(depth);
        Ok(())
    }
}

/// Weighted cost, with list fields discovered by composition counted as lists.
pub struct ComplexityStage {
    security: Arc<SecurityConfig>,
}

impl ComplexityStage {
    pub fn new(security: Arc<SecurityConfig>) -> Self {
        Self { security }
    }
}

impl AdmissionStage for ComplexityStage {
    fn name(&self) -> &'static str {
        "complexity"
    }

    fn phase(&self) -> Phase {
        Phase::Document
    }

    fn check(&self, ctx: &mut AdmissionContext) -> Verdict {
        let analyzer = ComplexityAnalyzer::new(
            &self.security.complexity,
            &ctx.supergraph.list_fields,
            &ctx.variables,
        );
        let cost = check_complexity(&analyzer, ctx.shape()?, self.security.max_query_complexity)?;
        ctx.complexity = Some(cost);
        Ok(())
    }
}

pub struct IntrospectionStage {
    security: Arc<SecurityConfig>,
}

impl IntrospectionStage {
    pub fn new(security: Arc<SecurityConfig>) -> Self {
        Self { security }
    }
}

impl AdmissionStage for IntrospectionStage {
    fn name(&self) -> &'static str {
        "introspection"
    }

    fn phase(&self) -> Phase {
        Phase::Document
    }

    fn check(&self, ctx: &mut AdmissionContext) -> Verdict {
        check_introspection(ctx.shape()?, self.security.mode)
    }
}
