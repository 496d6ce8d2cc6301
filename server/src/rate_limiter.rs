//! Token bucket rate limiting
//!
//! A bucket holds up to `capacity` tokens and regains `refill` tokens per
//! `interval`, accrued continuously. Consumption never blocks: callers ask
//! for tokens and either get them immediately or are turned away.

use crate::config::LimiterConfig;
use tokio::time::{Duration, Instant};

/// Absorbs float drift from fractional refill.
const EPSILON: f64 = 1e-9;

#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    /// Tokens regained per second
    refill_per_sec: f64,
    available: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket
    pub fn new(capacity: u32, refill: u32, interval: Duration) -> Self {
        let capacity = f64::from(capacity);
        let refill_per_sec = if interval.is_zero() {
            f64::INFINITY
        } else {
            f64::from(refill) / interval.as_secs_f64()
        };

        Self {
            capacity,
            refill_per_sec,
            available: capacity,
            last_refill: Instant::now(),
        }
    }

    pub fn from_config(config: LimiterConfig) -> Self {
        Self::new(config.capacity, config.refill, config.interval)
    }

    /// Takes `n` tokens if that many are available right now
    ///
    /// Pending refill is applied first. On failure the bucket is left as it
    /// was after refilling.
    pub fn try_consume(&mut self, n: u32) -> bool {
        self.refill();

        let wanted = f64::from(n);
        if self.available + EPSILON >= wanted {
            self.available = (self.available - wanted).max(0.0);
            true
        } else {
            false
        }
    }

    /// Tokens currently available, including refill accrued so far
    pub fn available_tokens(&mut self) -> f64 {
        self.refill();
        self.available
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        if elapsed > 0.0 {
            self.available = (self.available + elapsed * self.refill_per_sec).min(self.capacity);
        }
    }
}
