//! Resolved security policy.
//!
//! Built once from a validated [`GatewayConfig`] and shared by `Arc` with every
//! admission stage. Components branch on these fields only, never on the raw
//! process environment.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::config::schema::{EnvironmentMode, GatewayConfig, RateLimitKey};

/// Origins allowed to call the gateway from a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(HashSet<String>),
}

impl AllowedOrigins {
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.contains(origin.trim_end_matches('/')),
        }
    }
}

/// Cost model for the complexity analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexityRules {
    pub default_field_cost: u64,
    pub default_list_multiplier: u64,
    pub field_costs: HashMap<String, u64>,
    pub list_fields: HashSet<String>,
    pub list_size_arguments: Vec<String>,
}

impl ComplexityRules {
    pub fn field_cost(&self, field: &str) -> u64 {
        self.field_costs
            .get(field)
            .copied()
            .unwrap_or(self.default_field_cost)
    }
}

/// Immutable, process-lifetime security policy.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub mode: EnvironmentMode,
    pub allowed_origins: AllowedOrigins,
    pub max_request_bytes: usize,
    pub trust_forwarded_for: bool,

    pub rate_limit_enabled: bool,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub rate_limit_key: RateLimitKey,
    pub max_tracked_clients: usize,

    pub max_query_depth: usize,
    pub max_query_complexity: u64,
    pub complexity: ComplexityRules,

    pub protected_fields: HashSet<String>,
}

impl SecurityConfig {
    /// Resolve the policy from a validated configuration.
    pub fn resolve(config: &GatewayConfig) -> Self {
        let allowed_origins = match &config.security.allowed_origins {
            None => AllowedOrigins::Any,
            Some(origins) => AllowedOrigins::List(
                origins
                    .iter()
                    .map(|o| o.trim_end_matches('/').to_string())
                    .collect(),
            ),
        };

        Self {
            mode: config.security.mode,
            allowed_origins,
            max_request_bytes: config.security.max_request_bytes,
            trust_forwarded_for: config.security.trust_forwarded_for,
            rate_limit_enabled: config.rate_limit.enabled,
            rate_limit_max: config.rate_limit.max_requests,
            rate_limit_window: Duration::from_millis(config.rate_limit.window_ms),
            rate_limit_key: config.rate_limit.key_by,
            max_tracked_clients: config.rate_limit.max_tracked_clients,
            max_query_depth: config.query.max_depth,
            max_query_complexity: config.query.max_complexity,
            complexity: ComplexityRules {
                default_field_cost: config.query.default_field_cost,
                default_list_multiplier: config.query.default_list_multiplier,
                field_costs: config.query.field_costs.clone(),
                list_fields: config.query.list_fields.iter().cloned().collect(),
                list_size_arguments: config.query.list_size_arguments.clone(),
            },
            protected_fields: config.query.protected_fields.iter().cloned().collect(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self::resolve(&GatewayConfig::default())
    }
}
