//! Configuration loading from disk and environment.

use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::{EnvironmentMode, GatewayConfig, SubgraphConfig};
use crate::config::validation::{validate_config, ValidationError};

const SERVICE_URL_SUFFIX: &str = "_SERVICE_URL";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {var}")]
    InvalidEnv { var: String, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment overrides
/// from the process environment, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, std::env::vars())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the gateway's environment variables on top of `config`.
///
/// Takes the variables as an iterator so callers (and tests) control the source.
pub fn apply_env_overrides<I>(config: &mut GatewayConfig, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: BTreeMap<String, String> = vars.into_iter().collect();

    if let Some(port) = vars.get("GATEWAY_PORT") {
        let port: u16 = parse_var("GATEWAY_PORT", port)?;
        let mut addr: SocketAddr = config
            .listener
            .bind_address
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));
        addr.set_port(port);
        config.listener.bind_address = addr.to_string();
    }

    if let Some(v) = vars.get("RATE_LIMIT_MAX") {
        config.rate_limit.max_requests = parse_var("RATE_LIMIT_MAX", v)?;
    }
    if let Some(v) = vars.get("RATE_LIMIT_WINDOW_MS") {
        config.rate_limit.window_ms = parse_var("RATE_LIMIT_WINDOW_MS", v)?;
    }
    if let Some(v) = vars.get("QUERY_MAX_DEPTH") {
        config.query.max_depth = parse_var("QUERY_MAX_DEPTH", v)?;
    }
    if let Some(v) = vars.get("QUERY_MAX_COMPLEXITY") {
        config.query.max_complexity = parse_var("QUERY_MAX_COMPLEXITY", v)?;
    }
    if let Some(v) = vars.get("MAX_REQUEST_SIZE_BYTES") {
        config.security.max_request_bytes = parse_var("MAX_REQUEST_SIZE_BYTES", v)?;
    }

    if let Some(v) = vars.get("ALLOWED_ORIGINS") {
        config.security.allowed_origins = parse_origins(v);
    }

    // GATEWAY_ENV takes precedence over the conventional NODE_ENV.
    let mode_var = ["GATEWAY_ENV", "NODE_ENV"]
        .into_iter()
        .find_map(|name| vars.get(name).map(|value| (name, value)));
    if let Some((name, value)) = mode_var {
        config.security.mode =
            value
                .parse::<EnvironmentMode>()
                .map_err(|_| ConfigError::InvalidEnv {
                    var: name.to_string(),
                    value: value.clone(),
                })?;
    }

    for (var, url) in &vars {
        let Some(prefix) = var.strip_suffix(SERVICE_URL_SUFFIX) else {
            continue;
        };
        if prefix.is_empty() || url.trim().is_empty() {
            continue;
        }
        let name = prefix.to_ascii_lowercase().replace('_', "-");
        match config.subgraphs.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.url = url.trim().to_string(),
            None => config.subgraphs.push(SubgraphConfig {
                name,
                url: url.trim().to_string(),
            }),
        }
    }

    Ok(())
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// `*` or an empty list means any origin.
fn parse_origins(value: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = value
        .split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        None
    } else {
        Some(origins)
    }
}
