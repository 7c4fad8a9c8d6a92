//! Federation gateway: admission control and composition.

pub mod admin;
pub mod admission;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod query;
pub mod resilience;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, GraphQLError, GraphQLResponse};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
