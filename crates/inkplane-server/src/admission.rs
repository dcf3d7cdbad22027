//! Per-user fixed-window admission control for writes.
//!
//! Each user owns one [`RateLimitWindow`] row. A charge either fits in the
//! current window, is rejected with a retry hint, or resets the row because
//! the window rolled over. Bursts straddling a boundary can reach twice the
//! capacity; that is the price of O(1) state per user.

use crate::clock::Clock;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use inkplane_core::ServiceError;
use inkplane_core::protocol::AdmissionStatus;
use std::sync::Arc;
use tracing::{debug, warn};

/// Window length and capacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionLimits {
    pub window_ms: u64,
    pub capacity: f64,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            window_ms: crate::config::DEFAULT_WINDOW_MS,
            capacity: crate::config::DEFAULT_MAX_REQUESTS,
        }
    }
}

impl AdmissionLimits {
    /// Start of the window containing `now_ms`.
    pub fn window_start(&self, now_ms: u64) -> u64 {
        let window_ms = self.window_ms.max(1);
        now_ms / window_ms * window_ms
    }
}

/// Usage row for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitWindow {
    pub user_id: String,
    pub user_name: String,
    /// Aligned to a multiple of the window length.
    pub window_start: u64,
    /// Cost units charged in this window; fractional for edits.
    pub request_count: f64,
    pub last_request: u64,
}

/// A charge already applied to a user's window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionCharge {
    pub window_start: u64,
    pub cost: f64,
}

/// Gate for chargeable write operations.
///
/// Rows live in a `DashMap`; every charge runs under the entry's shard lock
/// so concurrent calls for the same user cannot both read the same count.
pub struct AdmissionController {
    limits: AdmissionLimits,
    clock: Arc<dyn Clock>,
    windows: DashMap<String, RateLimitWindow>,
}

impl AdmissionController {
    pub fn new(limits: AdmissionLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits,
            clock,
            windows: DashMap::new(),
        }
    }

    /// Charge `cost` units to `user_id`, or reject if the window is full.
    pub fn charge(
        &self,
        user_id: &str,
        user_name: &str,
        cost: f64,
    ) -> Result<AdmissionCharge, ServiceError> {
        let now = self.clock.now_ms();
        let window_start = self.limits.window_start(now);

        match self.windows.entry(user_id.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(RateLimitWindow {
                    user_id: user_id.to_string(),
                    user_name: user_name.to_string(),
                    window_start,
                    request_count: cost,
                    last_request: now,
                });
            }
            Entry::Occupied(mut entry) => {
                let row = entry.get_mut();
                if row.window_start == window_start {
                    if row.request_count + cost > self.limits.capacity {
                        let reset_at = window_start + self.limits.window_ms;
                        let retry_after_secs = (reset_at - now).div_ceil(1000);
                        warn!(
                            "Rate limit exceeded for {} ({} + {} > {}), retry in {}s",
                            user_id, row.request_count, cost, self.limits.capacity, retry_after_secs
                        );
                        return Err(ServiceError::RateLimited {
                            user: user_name.to_string(),
                            retry_after_secs,
                        });
                    }
                    row.request_count += cost;
                } else {
                    row.window_start = window_start;
                    row.request_count = cost;
                }
                row.user_name = user_name.to_string();
                row.last_request = now;
            }
        }
        debug!("Charged {} unit(s) to {}", cost, user_id);
        Ok(AdmissionCharge { window_start, cost })
    }

    /// Return a charge whose write did not happen.
    ///
    /// A charge from a window that has since rolled over is dropped.
    pub fn refund(&self, user_id: &str, charge: AdmissionCharge) {
        if let Some(mut row) = self.windows.get_mut(user_id) {
            if row.window_start == charge.window_start {
                row.request_count = (row.request_count - charge.cost).max(0.0);
                debug!("Refunded {} unit(s) to {}", charge.cost, user_id);
            }
        }
    }

    /// Usage of the current window for `user_id`.
    ///
    /// A row from an earlier window counts as unused.
    pub fn status(&self, user_id: &str) -> AdmissionStatus {
        let now = self.clock.now_ms();
        let window_start = self.limits.window_start(now);
        let window_reset_time = window_start + self.limits.window_ms;
        let used = self
            .windows
            .get(user_id)
            .filter(|row| row.window_start == window_start)
            .map(|row| row.request_count)
            .unwrap_or(0.0);

        AdmissionStatus {
            used,
            remaining: (self.limits.capacity - used).max(0.0),
            window_reset_time,
            is_limited: used >= self.limits.capacity,
        }
    }

    /// Current row for `user_id`, if any.
    pub fn window(&self, user_id: &str) -> Option<RateLimitWindow> {
        self.windows.get(user_id).map(|row| row.value().clone())
    }
}
