//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Origin policy, request size ceiling and environment mode.
    pub security: SecuritySettings,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Depth and complexity ceilings.
    pub query: QueryLimitsConfig,

    /// Backend services composed into the supergraph.
    pub subgraphs: Vec<SubgraphConfig>,

    /// Subgraph probing and re-probing.
    pub probe: ProbeConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
        }
    }
}

/// Development or production behavior for introspection and error masking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentMode {
    #[default]
    Development,
    Production,
}

impl EnvironmentMode {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for EnvironmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "test" | "" => Ok(Self::Development),
            other => Err(format!("unknown environment mode '{}'", other)),
        }
    }
}

impl fmt::Display for EnvironmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

/// Origin policy, size ceiling and mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Environment mode.
    pub mode: EnvironmentMode,

    /// Allowed CORS origins. `None` means any origin (development only).
    pub allowed_origins: Option<Vec<String>>,

    /// Maximum request body size in bytes.
    pub max_request_bytes: usize,

    /// Resolve client identity from X-Forwarded-For / X-Real-IP.
    pub trust_forwarded_for: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            mode: EnvironmentMode::Development,
            allowed_origins: None,
            max_request_bytes: 1024 * 1024, // 1MB
            trust_forwarded_for: false,
        }
    }
}

/// How the rate limiter derives a client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitKey {
    /// Source address only.
    #[default]
    Ip,
    /// Source address combined with the forwarded user id when present.
    IpAndUser,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per client per window.
    pub max_requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Client key derivation.
    pub key_by: RateLimitKey,

    /// Upper bound on tracked client windows.
    pub max_tracked_clients: usize,

    /// Interval between stale-window sweeps in milliseconds.
    pub sweep_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_ms: 60_000,
            key_by: RateLimitKey::Ip,
            max_tracked_clients: 100_000,
            sweep_interval_ms: 60_000,
        }
    }
}

/// Query depth/complexity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryLimitsConfig {
    /// Maximum selection-set nesting.
    pub max_depth: usize,

    /// Maximum weighted cost.
    pub max_complexity: u64,

    /// Cost of a field with no specific cost.
    pub default_field_cost: u64,

    /// Amplification applied to list fields without a pagination argument.
    pub default_list_multiplier: u64,

    /// Field-specific costs keyed by field name.
    pub field_costs: HashMap<String, u64>,

    /// Fields known to produce lists.
    pub list_fields: Vec<String>,

    /// Arguments whose value sizes a list (e.g. `first`, `limit`).
    pub list_size_arguments: Vec<String>,

    /// Root fields that require a forwarded identity.
    pub protected_fields: Vec<String>,
}

impl Default for QueryLimitsConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_complexity: 1000,
            default_field_cost: 1,
            default_list_multiplier: 10,
            field_costs: HashMap::new(),
            list_fields: Vec::new(),
            list_size_arguments: vec![
                "first".to_string(),
                "last".to_string(),
                "limit".to_string(),
                "pageSize".to_string(),
            ],
            protected_fields: Vec::new(),
        }
    }
}

/// A backend service composed into the supergraph.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubgraphConfig {
    /// Unique subgraph identifier.
    pub name: String,

    /// GraphQL endpoint URL (e.g., "http://users:4001/graphql").
    pub url: String,
}

/// Subgraph probing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Keep probing after startup and recompose on changes.
    pub reprobe_enabled: bool,

    /// Re-probe interval in seconds.
    pub interval_secs: u64,

    /// Consecutive failures before a subgraph is marked unreachable.
    pub unhealthy_threshold: u32,

    /// Consecutive successes before a subgraph is marked reachable.
    pub healthy_threshold: u32,

    /// Base delay for re-probing a failing subgraph in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum re-probe delay in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3_000,
            reprobe_enabled: true,
            interval_secs: 30,
            unhealthy_threshold: 3,
            healthy_threshold: 1,
            backoff_base_ms: 1_000,
            backoff_max_ms: 60_000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout for one forwarded subgraph call in milliseconds.
    pub subgraph_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            subgraph_ms: 10_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty in development, JSON in production.
    #[default]
    Auto,
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Number of recent operations kept for `/admin/stats`.
    pub stats_capacity: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Auto,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            stats_capacity: 1_000,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

pub const PLACEHOLDER_ADMIN_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: PLACEHOLDER_ADMIN_KEY.to_string(),
            bind_address: "127.0.0.1:4001".to_string(),
        }
    }
}
