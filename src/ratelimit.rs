//! Sliding-window limiter over a visitor's chat request timestamps.
//!
//! The timestamps live in the visitor's session (see [`crate::session`]), so
//! every session has an independent budget.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    Allowed { remaining: usize },
    Limited { retry_after_secs: u64 },
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Prunes timestamps at or beyond the window, then either rejects (when
    /// `max_requests` remain) or records `now` and allows.
    ///
    /// `history` and `now` are epoch seconds.
    pub fn check_and_record(&self, history: &mut Vec<f64>, now: f64) -> RateDecision {
        let window = self.window.as_secs_f64();
        history.retain(|t| now - t < window);

        if history.len() >= self.max_requests {
            let oldest = history.iter().cloned().fold(f64::INFINITY, f64::min);
            let retry = (oldest + window - now).ceil().max(0.0) as u64;
            return RateDecision::Limited {
                retry_after_secs: retry,
            };
        }

        history.push(now);
        RateDecision::Allowed {
            remaining: self.max_requests - history.len(),
        }
    }
}

pub fn epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly() -> RateLimiter {
        RateLimiter::new(10, Duration::from_secs(3600))
    }

    #[test]
    fn eleventh_request_in_an_hour_is_limited() {
        let limiter = hourly();
        let mut history = Vec::new();
        let start = 1_700_000_000.0;
        for i in 0..10 {
            let decision = limiter.check_and_record(&mut history, start + i as f64 * 60.0);
            assert!(matches!(decision, RateDecision::Allowed { .. }));
        }
        let decision = limiter.check_and_record(&mut history, start + 600.0);
        assert_eq!(
            decision,
            RateDecision::Limited {
                retry_after_secs: 3000
            }
        );
        // rejected requests are not recorded
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn stale_timestamp_is_pruned() {
        let limiter = hourly();
        let now = 1_700_000_000.0;
        let mut history = vec![now - 61.0 * 60.0];
        let decision = limiter.check_and_record(&mut history, now);
        assert_eq!(decision, RateDecision::Allowed { remaining: 9 });
        assert_eq!(history, vec![now]);
    }

    #[test]
    fn exactly_one_window_old_is_expired() {
        let limiter = RateLimiter::new(1, Duration::from_secs(3600));
        let now = 10_000.0;
        let mut history = vec![now - 3600.0];
        assert!(matches!(
            limiter.check_and_record(&mut history, now),
            RateDecision::Allowed { remaining: 0 }
        ));
    }
}
