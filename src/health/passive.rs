//! Passive health checking from forwarded calls.
//!
//! # Design Decisions
//! - Only transport errors, timeouts, garbage bodies and 5xx count as failures
//! - 4xx and GraphQL errors are NOT failures (the subgraph answered)
//! - Feeds the same tracker the active monitor uses

use crate::gateway::forwarder::ForwardError;
use crate::health::state::{HealthState, HealthTracker};
use crate::observability::metrics;

/// Record the outcome of a forwarded call against `subgraph`'s tracker.
pub fn observe<T>(subgraph: &str, tracker: &HealthTracker, outcome: &Result<T, ForwardError>) {
    let transition = match outcome {
        Ok(_) => tracker.mark_success(),
        Err(e) if e.is_health_failure() => tracker.mark_failure(),
        Err(_) => None,
    };
    metrics::record_subgraph_request(
        subgraph,
        match outcome {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        },
    );

    match transition {
        Some(HealthState::Unreachable) => {
            tracing::warn!(subgraph = %subgraph, "Subgraph marked unreachable after failed calls");
            metrics::record_subgraph_reachable(subgraph, false);
        }
        Some(HealthState::Reachable) => {
            tracing::info!(subgraph = %subgraph, "Subgraph reachable again");
            metrics::record_subgraph_reachable(subgraph, true);
        }
        _ => {}
    }
}
