//! Subgraph health subsystem.
//!
//! # Data Flow
//! ```text
//! Active re-probing (active.rs):
//!     Periodic timer
//!     → Introspection probe of each due subgraph
//!     → Update state.rs, back off failing subgraphs
//!     → Recompose the supergraph when a schema appears or changes
//!
//! Passive checks (passive.rs):
//!     Forwarded call fails (transport, timeout, 5xx)
//!     → Update state.rs
//!
//! State machine (state.rs):
//!     Unknown → Reachable ←→ Unreachable
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Active and passive checks feed the same tracker
//! - State transitions require consecutive successes/failures
//! - Health state is per subgraph

pub mod active;
pub mod passive;
pub mod state;

pub use active::HealthMonitor;
pub use state::{HealthState, HealthTracker};
