use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Time source for pacing, cooldowns and Live Mode alignment.
pub trait Clock: Send + Sync {
    /// Monotonic instant.
    fn now(&self) -> Instant;
    /// Wall-clock milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;
    /// Block the calling thread for `dur`.
    fn sleep(&self, dur: Duration);
}

/// Clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn sleep(&self, dur: Duration) {
        std::thread::sleep(dur);
    }
}

/// Deterministic clock that only moves when advanced or slept on.
///
/// Every `sleep` is recorded so tests can assert on pacing decisions.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    epoch_base_ms: u64,
    inner: Mutex<ManualClockInner>,
}

#[derive(Debug, Default)]
struct ManualClockInner {
    offset: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    /// Create a clock whose wall time starts at `epoch_ms`.
    pub fn new(epoch_ms: u64) -> Self {
        Self {
            base: Instant::now(),
            epoch_base_ms: epoch_ms,
            inner: Mutex::new(ManualClockInner::default()),
        }
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, dur: Duration) {
        let mut inner = self.inner.lock();
        inner.offset += dur;
    }

    /// Sleeps requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }

    /// Forget recorded sleeps.
    pub fn clear_sleeps(&self) {
        self.inner.lock().sleeps.clear();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.inner.lock().offset
    }

    fn epoch_ms(&self) -> u64 {
        let offset = self.inner.lock().offset;
        self.epoch_base_ms.saturating_add(offset.as_millis() as u64)
    }

    fn sleep(&self, dur: Duration) {
        let mut inner = self.inner.lock();
        inner.offset += dur;
        inner.sleeps.push(dur);
        drop(inner);
        // Threads driven by a manual clock still have to let their peers run.
        std::thread::yield_now();
    }
}
