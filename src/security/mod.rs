//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (declared and observed body size)
//!     → headers.rs (origin policy, security headers, preflight)
//!     → rate_limit.rs (per-client fixed window)
//!     → [document analysis in query/]
//! Outgoing errors:
//!     → masking.rs (mode-dependent detail)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input; forwarded-for headers only when configured

pub mod headers;
pub mod limits;
pub mod masking;
pub mod rate_limit;

pub use masking::ErrorMasker;
pub use rate_limit::{client_key, RateLimiter};
