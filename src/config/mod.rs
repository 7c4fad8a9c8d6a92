//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: GATEWAY_PORT, RATE_LIMIT_*, *_SERVICE_URL, ...)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated)
//!     → security.rs (resolved, immutable SecurityConfig)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Environment mode is read here once; nothing else reads the environment

pub mod loader;
pub mod schema;
pub mod security;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, EnvironmentMode, GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    ProbeConfig, QueryLimitsConfig, RateLimitConfig, RateLimitKey, SecuritySettings,
    SubgraphConfig, TimeoutConfig,
};
pub use security::{AllowedOrigins, ComplexityRules, SecurityConfig};
