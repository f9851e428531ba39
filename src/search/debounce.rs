//! Generation-counted debounce for the semantic leg.
//!
//! Each call claims a new generation, waits out the delay, and runs its job
//! only if no newer call has claimed the counter in the meantime. A late
//! result is checked again after the job completes, so a superseded query's
//! response is discarded even when it arrives after the newer query started.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct Debounce {
    generation: AtomicU64,
    delay: Duration,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            generation: AtomicU64::new(0),
            delay,
        }
    }

    /// Invalidate any pending or in-flight run without starting a new one
    /// (used on teardown).
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Wait out the delay, then run `job`. Returns `None` if a newer run
    /// superseded this one, either during the delay or while the job was in
    /// flight.
    pub async fn run<F, Fut, T>(&self, job: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.delay).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }

        let out = job().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        Some(out)
    }
}
