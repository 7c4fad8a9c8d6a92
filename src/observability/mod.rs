//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → stats.rs (recent operations for the admin API)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → /admin/stats
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all subsystems and out to subgraphs
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod stats;

pub use stats::{OperationRecord, OperationStats, StatsSnapshot};
