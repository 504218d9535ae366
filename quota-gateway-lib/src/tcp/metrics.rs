#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Process-wide session and upstream counters.
#[derive(Debug, Default)]
pub struct ConnectionCount {
    current: AtomicUsize,
    total: AtomicUsize,
    errors: AtomicUsize,
    upstream_opened: AtomicUsize,
    upstream_closed: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionSnapshot {
    pub current: usize,
    pub total: usize,
    pub errors: usize,
    pub upstream_opened: usize,
    pub upstream_closed: usize,
}

impl ConnectionCount {
    pub fn increment(&self) {
        self.current.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.current
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
            .ok();
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upstream_opened(&self) {
        self.upstream_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upstream_closed(&self) {
        self.upstream_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            current: self.current.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            upstream_opened: self.upstream_opened.load(Ordering::Relaxed),
            upstream_closed: self.upstream_closed.load(Ordering::Relaxed),
        }
    }
}

/// Guard to decrement the active session counter when dropped
pub struct SessionGuard(Arc<ConnectionCount>);

impl SessionGuard {
    pub fn new(counts: Arc<ConnectionCount>) -> Self {
        counts.increment();
        Self(counts)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}
