use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::LimiterConfig;

/// Fixed-capacity permit pool shared by all sessions.
///
/// Every mutation of the permit count goes through a single atomic
/// compare-and-swap, so a permit can never be handed out twice and the count
/// never leaves `0..=capacity`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: usize,
    refill_interval: Duration,
    available: AtomicUsize,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// # Parameters
    /// - `capacity`: permits available after every refill
    /// - `refill_interval`: time between refills, driven by [`super::RefillTask`]
    pub fn new(capacity: usize, refill_interval: Duration) -> Self {
        Self { capacity, refill_interval, available: AtomicUsize::new(capacity) }
    }

    pub fn from_config(cfg: &LimiterConfig) -> Self {
        Self::new(cfg.capacity, cfg.refill_interval())
    }

    /// Take one permit.
    ///
    /// Returns `true` if a permit was taken, `false` if the bucket is empty.
    /// An empty bucket is left untouched.
    pub fn try_consume(&self) -> bool {
        match self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1))
        {
            Ok(prev) => {
                debug!(remaining = prev.saturating_sub(1), "consumed token");
                true
            }
            Err(_) => false,
        }
    }

    /// Permits currently left. Diagnostic only, may be stale by the time it is read.
    pub fn remaining(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    /// Reset the bucket to full capacity, whatever its current level.
    pub fn refill(&self) {
        let before = self.available.swap(self.capacity, Ordering::AcqRel);
        info!(before, capacity = self.capacity, "refilling token bucket");
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::from_config(&LimiterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn default_bucket_matches_reference_values() {
        let bucket = TokenBucket::default();
        assert_eq!(bucket.capacity(), 10);
        assert_eq!(bucket.remaining(), 10);
        assert_eq!(bucket.refill_interval(), Duration::from_secs(60));
    }

    #[test]
    fn never_grants_more_than_capacity() {
        let bucket = TokenBucket::new(5, Duration::from_secs(60));

        let granted = (0..20).filter(|_| bucket.try_consume()).count();
        assert_eq!(granted, 5);
        assert_eq!(bucket.remaining(), 0);

        // Failed attempts do not underflow
        assert!(!bucket.try_consume());
        assert_eq!(bucket.remaining(), 0);
    }

    #[test]
    fn remaining_decreases_by_one_per_permit() {
        let bucket = TokenBucket::new(3, Duration::from_secs(60));
        for expected in (0..3).rev() {
            assert!(bucket.try_consume());
            assert_eq!(bucket.remaining(), expected);
        }
    }

    #[test]
    fn refill_restores_full_capacity() {
        let bucket = TokenBucket::new(4, Duration::from_secs(60));
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        bucket.refill();
        assert_eq!(bucket.remaining(), 4);

        for _ in 0..4 {
            assert!(bucket.try_consume());
        }
        bucket.refill();
        assert_eq!(bucket.remaining(), 4);

        // Refilling a full bucket does not overshoot
        bucket.refill();
        assert_eq!(bucket.remaining(), 4);
    }

    #[test]
    fn zero_capacity_bucket_rejects_everything() {
        let bucket = TokenBucket::new(0, Duration::from_secs(1));
        assert!(!bucket.try_consume());
        bucket.refill();
        assert!(!bucket.try_consume());
    }

    #[test]
    fn concurrent_callers_get_exactly_capacity_permits() -> Result<(), Box<dyn std::error::Error>> {
        let capacity = 16;
        let callers = 64;
        let bucket = Arc::new(TokenBucket::new(capacity, Duration::from_secs(60)));
        let granted = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(callers));

        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let bucket = bucket.clone();
                let granted = granted.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    if bucket.try_consume() {
                        granted.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().map_err(|_| "worker panicked")?;
        }

        assert_eq!(granted.load(Ordering::Relaxed), capacity);
        assert_eq!(bucket.remaining(), 0);
        Ok(())
    }
}
