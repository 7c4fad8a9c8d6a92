//! Federation subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     registry.rs (probe every subgraph concurrently)
//!     → composer.rs (root-field ownership, merged types)
//!     → Supergraph swapped in atomically
//!
//! Per request:
//!     executor.rs (plan root fields, group by owner)
//!     → forwarder.rs (authenticated subgraph calls)
//!     → local.rs (__typename, introspection, health)
//!     → merged partial result
//! ```

pub mod composer;
pub mod executor;
pub mod forwarder;
pub mod local;
pub mod registry;

pub use composer::{Supergraph, SupergraphMode};
pub use executor::{Execution, Executor};
pub use forwarder::{ForwardError, Forwarder};
pub use registry::{HealthReport, ProbeError, Registry, Subgraph, SubgraphDescriptor};
