//! Sliding-window limiter for outbound mirror calls.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::util::serde::Priority;

/// Limiter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Nominal calls allowed per window.
    pub max_calls: usize,
    /// Window length.
    pub window: Duration,
    /// Share of the quota low-priority calls may use.
    pub low_priority_share: f64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_calls: 100,
            window: Duration::from_secs(100),
            low_priority_share: 0.3,
        }
    }
}

impl RateLimit {
    /// Window occupancy at which low-priority calls are refused.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn low_priority_limit(&self) -> usize {
        (self.max_calls as f64 * self.low_priority_share.clamp(0.0, 1.0)).ceil() as usize
    }
}

/// Sliding-window limiter. Low-priority calls are shed once the window holds
/// their share of the quota; high-priority calls always pass, with a warning
/// past the quota. Only allowed calls are recorded.
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter.
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            calls: Mutex::new(VecDeque::with_capacity(limit.max_calls)),
        }
    }

    /// Settings in use.
    pub const fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Try to take a call slot now.
    pub fn try_acquire(&self, priority: Priority) -> bool {
        self.try_acquire_at(priority, Instant::now())
    }

    /// Try to take a call slot at `now`.
    pub fn try_acquire_at(&self, priority: Priority, now: Instant) -> bool {
        let mut calls = self.calls.lock();
        Self::evict(&mut calls, now, self.limit.window);
        let in_window = calls.len();
        match priority {
            Priority::Low if in_window >= self.limit.low_priority_limit() => {
                debug!(in_window, "low-priority mirror call shed");
                return false;
            }
            Priority::High if in_window >= self.limit.max_calls => {
                warn!(in_window, max_calls = self.limit.max_calls, "mirror quota exceeded; high-priority call allowed");
            }
            _ => {}
        }
        calls.push_back(now);
        true
    }

    /// Calls recorded in the window ending now.
    pub fn in_window(&self) -> usize {
        self.in_window_at(Instant::now())
    }

    /// Calls recorded in the window ending at `now`.
    pub fn in_window_at(&self, now: Instant) -> usize {
        let mut calls = self.calls.lock();
        Self::evict(&mut calls, now, self.limit.window);
        calls.len()
    }

    fn evict(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = calls.front() {
            if now.saturating_duration_since(*front) >= window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimit::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_priority_shed_at_thirty_percent() {
        let limiter = RateLimiter::default();
        let now = Instant::now();
        for _ in 0..29 {
            assert!(limiter.try_acquire_at(Priority::Low, now));
        }
        assert!(limiter.try_acquire_at(Priority::Low, now));
        assert!(!limiter.try_acquire_at(Priority::Low, now));
        assert_eq!(limiter.in_window_at(now), 30);
    }

    #[test]
    fn test_high_priority_never_blocked() {
        let limiter = RateLimiter::new(RateLimit {
            max_calls: 3,
            window: Duration::from_secs(10),
            low_priority_share: 0.3,
        });
        let now = Instant::now();
        for _ in 0..5 {
            assert!(limiter.try_acquire_at(Priority::High, now));
        }
        assert_eq!(limiter.in_window_at(now), 5);
        assert!(!limiter.try_acquire_at(Priority::Low, now));
    }

    #[test]
    fn test_rejected_calls_are_not_recorded() {
        let limiter = RateLimiter::new(RateLimit {
            max_calls: 10,
            window: Duration::from_secs(10),
            low_priority_share: 0.1,
        });
        let now = Instant::now();
        assert!(limiter.try_acquire_at(Priority::Low, now));
        for _ in 0..5 {
            assert!(!limiter.try_acquire_at(Priority::Low, now));
        }
        assert_eq!(limiter.in_window_at(now), 1);
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(RateLimit {
            max_calls: 10,
            window: Duration::from_secs(10),
            low_priority_share: 0.1,
        });
        let start = Instant::now();
        assert!(limiter.try_acquire_at(Priority::Low, start));
        assert!(!limiter.try_acquire_at(Priority::Low, start + Duration::from_secs(9)));
        assert!(limiter.try_acquire_at(Priority::Low, start + Duration::from_secs(10)));
    }
}
