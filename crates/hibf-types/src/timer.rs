//! Accumulating timers used to profile the build pipeline.
//!
//! `ConcurrentTimer` is the only shared-mutable-state primitive the
//! concurrency model (spec §5) allows beyond an atomic counter: its
//! accumulator only ever grows, via `+=`, and reads/writes commute.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A timer that is only ever touched from one thread at a time.
#[derive(Debug, Default)]
pub struct SerialTimer {
    start: Option<Instant>,
    elapsed_nanos: u64,
}

impl SerialTimer {
    /// Creates a fresh, not-yet-started timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a measured interval.
    pub fn start(&mut self) {
        self.start = Some(Instant::now());
    }

    /// Marks the end of a measured interval, folding its length into the
    /// accumulator.
    pub fn stop(&mut self) {
        if let Some(start) = self.start.take() {
            self.elapsed_nanos = self
                .elapsed_nanos
                .saturating_add(start.elapsed().as_nanos() as u64);
        }
    }

    /// Total accumulated duration across every `start`/`stop` pair.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos)
    }
}

/// An atomic accumulator of elapsed nanoseconds, safe to share across
/// worker threads. `merge` only ever adds ticks, never subtracts, so
/// concurrent `merge` calls commute.
#[derive(Debug, Default)]
pub struct ConcurrentTimer {
    elapsed_nanos: AtomicU64,
}

impl ConcurrentTimer {
    /// Creates a fresh timer with zero accumulated time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `f` and folds its duration into the accumulator.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.add(start.elapsed());
        result
    }

    /// Folds `duration` into the accumulator directly, e.g. from a
    /// `SerialTimer` collected by a worker thread.
    pub fn add(&self, duration: Duration) {
        self.elapsed_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Merges another concurrent timer's accumulated time into this one.
    pub fn merge(&self, other: &ConcurrentTimer) {
        self.add(Duration::from_nanos(
            other.elapsed_nanos.load(Ordering::Relaxed),
        ));
    }

    /// Total accumulated duration.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::Relaxed))
    }
}
