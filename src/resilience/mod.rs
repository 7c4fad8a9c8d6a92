//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Subgraph call:
//!     → forwarder deadline (per call timeout)
//!     → passive health observation
//!     → unreachable subgraph fails fast while the monitor runs
//!
//! Re-probe of a failing subgraph:
//!     → backoff.rs (doubling delay with jitter, capped)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every subgraph call has a deadline
//! - Forwarded operations are never retried; mutations are not idempotent

pub mod backoff;

pub use backoff::Backoff;
