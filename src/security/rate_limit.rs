//! Fixed-window rate limiting per client identity.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::config::{RateLimitKey, SecurityConfig};
use crate::error::GatewayError;
use crate::observability::metrics;

/// Windows inspected when the map is full and a new client arrives.
const EVICTION_SAMPLE: usize = 16;

/// Request count for one client inside the current window.
#[derive(Debug, Clone, Copy)]
pub struct ClientWindow {
    pub count: u32,
    pub window_start: Instant,
}

/// Point-in-time view of the limiter for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterSnapshot {
    pub enabled: bool,
    pub tracked_clients: usize,
    pub max_tracked_clients: usize,
    pub max_requests: u32,
    pub window_ms: u64,
    pub rejected_total: u64,
}

/// Fixed-window limiter.
///
/// The read-modify-write for a client happens under its `DashMap` entry guard and never
/// suspends, so concurrent requests from one client cannot both slip under the limit.
pub struct RateLimiter {
    windows: DashMap<String, ClientWindow>,
    enabled: bool,
    max_requests: u32,
    window: Duration,
    max_tracked_clients: usize,
    rejected: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, max_tracked_clients: usize) -> Self {
        Self {
            windows: DashMap::new(),
            enabled: true,
            max_requests,
            window,
            max_tracked_clients,
            rejected: AtomicU64::new(0),
        }
    }

    pub fn from_security(security: &SecurityConfig) -> Self {
        let mut limiter = Self::new(
            security.rate_limit_max,
            security.rate_limit_window,
            security.max_tracked_clients,
        );
        limiter.enabled = security.rate_limit_enabled;
        limiter
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn check(&self, key: &str) -> Result<u32, GatewayError> {
        self.check_at(key, Instant::now())
    }

    /// Count one request from `key` at `now`. Returns the count within the window.
    pub fn check_at(&self, key: &str, now: Instant) -> Result<u32, GatewayError> {
        if !self.enabled {
            return Ok(0);
        }

        if !self.windows.contains_key(key) && self.windows.len() >= self.max_tracked_clients {
            self.make_room();
        }

        let (count, window_start) = {
            let mut entry = self.windows.entry(key.to_string()).or_insert(ClientWindow {
                count: 0,
                window_start: now,
            });
            if now.saturating_duration_since(entry.window_start) >= self.window {
                entry.count = 0;
                entry.window_start = now;
            }
            entry.count = entry.count.saturating_add(1);
            (entry.count, entry.window_start)
        };

        if count > self.max_requests {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            let remaining = self
                .window
                .saturating_sub(now.saturating_duration_since(window_start));
            let retry_after_secs = remaining.as_millis().div_ceil(1000).max(1) as u64;
            tracing::warn!(client = %key, count, max = self.max_requests, "Rate limit exceeded");
            return Err(GatewayError::RateLimitExceeded { retry_after_secs });
        }

        Ok(count)
    }

    /// Evict the oldest window among a bounded sample.
    ///
    /// Expired windows are left to the sweeper, so a burst of new clients costs at most
    /// `EVICTION_SAMPLE` entries each rather than a pass over the whole map.
    fn make_room(&self) {
        let oldest = self
            .windows
            .iter()
            .take(EVICTION_SAMPLE)
            .min_by_key(|entry| entry.value().window_start)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.windows.remove(&key);
            tracing::debug!(client = %key, "Evicted rate limit window to stay under capacity");
        }
    }

    /// Remove windows that have fully elapsed. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    pub fn snapshot(&self) -> LimiterSnapshot {
        LimiterSnapshot {
            enabled: self.enabled,
            tracked_clients: self.windows.len(),
            max_tracked_clients: self.max_tracked_clients,
            max_requests: self.max_requests,
            window_ms: self.window.as_millis() as u64,
            rejected_total: self.rejected.load(Ordering::Relaxed),
        }
    }

    /// Periodically sweep expired windows until shutdown.
    pub async fn run_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep(Instant::now());
                    let tracked = self.tracked_clients();
                    metrics::record_rate_limiter_clients(tracked);
                    if removed > 0 {
                        tracing::debug!(removed, tracked, "Swept expired rate limit windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// Key the limiter counts against.
pub fn client_key(client_identity: &str, user_id: Option<&str>, key_by: RateLimitKey) -> String {
    match (key_by, user_id) {
        (RateLimitKey::IpAndUser, Some(user)) => format!("{}|{}", client_identity, user),
        _ => client_identity.to_string(),
    }
}
