//! Global admission quota for the gateway.
//!
//! A single [`TokenBucket`] is shared by every client session. Each admitted
//! message takes one permit; a background [`RefillTask`] puts the bucket back
//! to full capacity once per interval.
//!
//! The refill is a hard reset rather than continuous accrual: the full burst
//! becomes available once per interval and throughput is capped at
//! `capacity` messages per interval, with no smoothing inside the interval.
//!
//! # Example Usage
//!
//! ```ignore
//! use quota_gateway_lib::limiter::{RefillTask, TokenBucket};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let bucket = Arc::new(TokenBucket::new(10, Duration::from_secs(60)));
//! let (_tx, shutdown) = tokio::sync::watch::channel(false);
//! let _refill = RefillTask::spawn(bucket.clone(), shutdown);
//!
//! if bucket.try_consume() {
//!     // forward the message
//! } else {
//!     // reply with 429
//! }
//! ```

mod bucket;
mod refill;

pub use bucket::TokenBucket;
pub use refill::RefillTask;
