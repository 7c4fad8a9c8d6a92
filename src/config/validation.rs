//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits and windows > 0)
//! - Check subgraph names are unique and URLs are http(s)
//! - Enforce production-only constraints (explicit origins, real admin key)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::{GatewayConfig, PLACEHOLDER_ADMIN_KEY};
use crate::query::shape::MAX_NESTING;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("query.max_depth must not exceed {ceiling}")]
    DepthAboveCeiling { ceiling: usize },

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("duplicate subgraph name '{0}'")]
    DuplicateSubgraph(String),

    #[error("subgraph '{name}' has invalid url '{url}'")]
    InvalidSubgraphUrl { name: String, url: String },

    #[error("allowed_origins must be set explicitly in production")]
    AnyOriginInProduction,

    #[error("admin.api_key must be changed before enabling the admin API in production")]
    PlaceholderAdminKey,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let positive: [(&'static str, u64); 8] = [
        ("rate_limit.max_requests", config.rate_limit.max_requests as u64),
        ("rate_limit.window_ms", config.rate_limit.window_ms),
        ("rate_limit.max_tracked_clients", config.rate_limit.max_tracked_clients as u64),
        ("query.max_depth", config.query.max_depth as u64),
        ("query.max_complexity", config.query.max_complexity),
        ("security.max_request_bytes", config.security.max_request_bytes as u64),
        ("probe.timeout_ms", config.probe.timeout_ms),
        ("timeouts.subgraph_ms", config.timeouts.subgraph_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::MustBePositive { field });
        }
    }
    if config.query.max_depth > MAX_NESTING {
        errors.push(ValidationError::DepthAboveCeiling {
            ceiling: MAX_NESTING,
        });
    }
    if config.probe.reprobe_enabled && config.probe.interval_secs == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "probe.interval_secs",
        });
    }

    let mut seen = HashSet::new();
    for subgraph in &config.subgraphs {
        if !seen.insert(subgraph.name.as_str()) {
            errors.push(ValidationError::DuplicateSubgraph(subgraph.name.clone()));
        }
        let valid = Url::parse(&subgraph.url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidSubgraphUrl {
                name: subgraph.name.clone(),
                url: subgraph.url.clone(),
            });
        }
    }

    if config.security.mode.is_production() {
        if config.security.allowed_origins.is_none() {
            errors.push(ValidationError::AnyOriginInProduction);
        }
        if config.admin.enabled && config.admin.api_key == PLACEHOLDER_ADMIN_KEY {
            errors.push(ValidationError::PlaceholderAdminKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{EnvironmentMode, SubgraphConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.rate_limit.window_ms = 0;
        config.query.max_depth = 0;
        config.subgraphs = vec![
            SubgraphConfig {
                name: "users".into(),
                url: "http://users:4001/graphql".into(),
            },
            SubgraphConfig {
                name: "users".into(),
                url: "ftp://users".into(),
            },
        ];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MustBePositive {
            field: "rate_limit.window_ms"
        }));
        assert!(errors.contains(&ValidationError::MustBePositive {
            field: "query.max_depth"
        }));
        assert!(errors.contains(&ValidationError::DuplicateSubgraph("users".into())));
        assert!(!errors
            .iter()
            .any(|e| matches!(e, ValidationError::DepthAboveCeiling { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidSubgraphUrl { .. })));
    }

    #[test]
    fn test_production_requires_explicit_origins() {
        let mut config = GatewayConfig::default();
        config.security.mode = EnvironmentMode::Production;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::AnyOriginInProduction]
        );

        config.security.allowed_origins = Some(vec!["https://app.example.com".into()]);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_production_rejects_placeholder_admin_key() {
        let mut config = GatewayConfig::default();
        config.security.mode = EnvironmentMode::Production;
        config.security.allowed_origins = Some(Vec::new());
        config.admin.enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::PlaceholderAdminKey]
        );
    }

    #[test]
    fn test_depth_above_nesting_ceiling() {
        let mut config = GatewayConfig::default();
        config.query.max_depth = MAX_NESTING + 1;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::DepthAboveCeiling {
                ceiling: MAX_NESTING
            }]
        );
    }
}
