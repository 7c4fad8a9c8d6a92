//! Subgraph reachability state machine.
//!
//! # State Transitions
//! ```text
//! Reachable → Unreachable: consecutive failures >= unhealthy_threshold
//! Unreachable → Reachable: consecutive successes >= healthy_threshold
//! ```
//!
//! The startup probe sets the state directly; afterwards only the thresholds move it.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Reachable = 1,
    Unreachable = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Reachable,
            2 => HealthState::Unreachable,
            _ => HealthState::Unknown,
        }
    }
}

/// Lock-free reachability tracker with hysteresis.
#[derive(Debug)]
pub struct HealthTracker {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    healthy_threshold: u32,
    unhealthy_threshold: u32,
}

impl HealthTracker {
    pub fn new(healthy_threshold: u32, unhealthy_threshold: u32) -> Self {
        Self {
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            healthy_threshold: healthy_threshold.max(1),
            unhealthy_threshold: unhealthy_threshold.max(1),
        }
    }

    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    pub fn is_reachable(&self) -> bool {
        self.state() == HealthState::Reachable
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Set the state without hysteresis (startup probe).
    pub fn force(&self, reachable: bool) {
        let state = if reachable {
            HealthState::Reachable
        } else {
            HealthState::Unreachable
        };
        self.state.store(state as u8, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
        self.consecutive_failures
            .store(if reachable { 0 } else { 1 }, Ordering::Relaxed);
    }

    /// Record a success. Returns the new state on a transition.
    pub fn mark_success(&self) -> Option<HealthState> {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if self.is_reachable() {
            return None;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= self.healthy_threshold {
            self.state
                .store(HealthState::Reachable as u8, Ordering::Relaxed);
            self.consecutive_successes.store(0, Ordering::Relaxed);
            return Some(HealthState::Reachable);
        }
        None
    }

    /// Record a failure. Returns the new state on a transition.
    pub fn mark_failure(&self) -> Option<HealthState> {
        self.consecutive_successes.store(0, Ordering::Relaxed);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if self.state() == HealthState::Unreachable {
            return None;
        }

        if failures >= self.unhealthy_threshold {
            self.state
                .store(HealthState::Unreachable as u8, Ordering::Relaxed);
            return Some(HealthState::Unreachable);
        }
        None
    }
}
