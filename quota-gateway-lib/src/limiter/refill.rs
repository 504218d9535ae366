use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

use super::TokenBucket;

/// Background task that resets a [`TokenBucket`] to full capacity every
/// refill interval.
///
/// The task ends when the shutdown channel flips to `true` (or its sender is
/// dropped), when [`RefillTask::stop`] is called, or when the runtime exits.
pub struct RefillTask {
    handle: JoinHandle<()>,
}

impl RefillTask {
    /// Spawn the refill loop on the current tokio runtime.
    pub fn spawn(bucket: Arc<TokenBucket>, shutdown: watch::Receiver<bool>) -> Self {
        let handle = tokio::spawn(refill_loop(bucket, shutdown));
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the loop and wait for it to unwind.
    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

async fn refill_loop(bucket: Arc<TokenBucket>, mut shutdown: watch::Receiver<bool>) {
    let period = bucket.refill_interval();
    // Ticks stay on a fixed schedule measured from spawn
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = ticker.tick() => bucket.refill(),
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    debug!("refill task stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn refills_after_each_interval() {
        let bucket = Arc::new(TokenBucket::new(2, Duration::from_secs(60)));
        let (_tx, rx) = watch::channel(false);
        let task = RefillTask::spawn(bucket.clone(), rx);

        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());

        // Still empty just before the interval elapses
        sleep(Duration::from_secs(59)).await;
        assert_eq!(bucket.remaining(), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(bucket.remaining(), 2);

        assert!(bucket.try_consume());
        sleep(Duration::from_secs(60)).await;
        assert_eq!(bucket.remaining(), 2);

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn non_shutdown_update_keeps_refill_schedule() {
        let bucket = Arc::new(TokenBucket::new(1, Duration::from_secs(60)));
        let (tx, rx) = watch::channel(false);
        let task = RefillTask::spawn(bucket.clone(), rx);

        assert!(bucket.try_consume());
        sleep(Duration::from_secs(50)).await;
        tx.send(false).ok();
        sleep(Duration::from_secs(15)).await;
        assert_eq!(bucket.remaining(), 1, "refill due at t=60s did not fire by t=65s");

        assert!(!task.is_finished());
        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_shutdown_signal() {
        let bucket = Arc::new(TokenBucket::new(1, Duration::from_secs(60)));
        let (tx, rx) = watch::channel(false);
        let task = RefillTask::spawn(bucket.clone(), rx);

        let _ = tx.send(true);
        sleep(Duration::from_millis(10)).await;
        assert!(task.is_finished());

        // No refill happens once stopped
        assert!(bucket.try_consume());
        sleep(Duration::from_secs(120)).await;
        assert_eq!(bucket.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_stops_the_loop() {
        let bucket = Arc::new(TokenBucket::new(1, Duration::from_secs(60)));
        let (tx, rx) = watch::channel(false);
        let task = RefillTask::spawn(bucket, rx);

        drop(tx);
        sleep(Duration::from_millis(10)).await;
        assert!(task.is_finished());
    }
}
