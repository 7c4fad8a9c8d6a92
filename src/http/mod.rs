//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, security headers, request ID, tracing, timeout)
//!     → request.rs (client identity, forwarded caller context)
//!     → admission pipeline → executor
//!     → response.rs (GraphQL response body, Retry-After)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID};
pub use server::{build_router, AppState, GatewayServer};
