//! Federation gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────────┐
//!                      │                FEDERATION GATEWAY                  │
//!                      │                                                    │
//!   POST /graphql      │  ┌──────────────┐   ┌──────────┐   ┌───────────┐  │
//!   ──────────────────▶│  │ header phase │──▶│  capped  │──▶│ document  │  │
//!                      │  │ size/origin/ │   │ body read│   │ phase     │  │
//!                      │  │ rate limit   │   └──────────┘   │ parse/    │  │
//!                      │  └──────────────┘                  │ depth/cost│  │
//!                      │                                    │ /introspec│  │
//!                      │                                    └─────┬─────┘  │
//!                      │                                          ▼        │
//!   JSON response      │  ┌──────────┐   ┌──────────────────────────────┐  │
//!   ◀──────────────────┼──│  masking │◀──│ executor (root fields by     │──┼──▶ subgraphs
//!                      │  └──────────┘   │ owner, identity forwarded)   │  │
//!                      │                 └──────────────────────────────┘  │
//!                      │                                                    │
//!                      │  registry + composer ◀── health monitor (re-probe) │
//!                      │  admin API · Prometheus metrics · operation stats  │
//!                      └────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use federation_gateway::config::load_config;
use federation_gateway::lifecycle;
use federation_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "federation-gateway")]
#[command(about = "GraphQL federation gateway with admission control", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability, config.security.mode)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.security.mode,
        bind_address = %config.listener.bind_address,
        subgraphs = config.subgraphs.len(),
        "federation-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    lifecycle::run(config).await?;
    Ok(())
}
