use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Tracks the age of the most recent accepted motion target.
///
/// The timestamp is written by the command surface on every accepted target
/// (request or stream) and read lock-free by the cyclic loop each tick.
/// When the loop forces the safe target it re-arms the timestamp, so one
/// expiry produces exactly one forced write until a genuine command arrives.
#[derive(Debug)]
pub struct TargetWatchdog {
    origin: Instant,
    last_refresh_us: AtomicU64,
    timeout_us: u64,
}

impl TargetWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            origin: Instant::now(),
            last_refresh_us: AtomicU64::new(0),
            timeout_us: timeout.as_micros() as u64,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_micros(self.timeout_us)
    }

    /// Monotonic microseconds since construction.
    pub fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    /// Record a command arrival (or a forced safe-target write) at `now`.
    pub fn refresh(&self) {
        self.refresh_at(self.now_us());
    }

    /// Whether the command stream has been stale for longer than the timeout.
    pub fn expired(&self) -> bool {
        self.expired_at(self.now_us())
    }

    /// Explicit-clock variant of [`refresh`](Self::refresh).
    pub fn refresh_at(&self, now_us: u64) {
        self.last_refresh_us.store(now_us, Ordering::Release);
    }

    /// Explicit-clock variant of [`expired`](Self::expired).
    pub fn expired_at(&self, now_us: u64) -> bool {
        let last = self.last_refresh_us.load(Ordering::Acquire);
        now_us.saturating_sub(last) > self.timeout_us
    }

    /// Timestamp of the last accepted command, in microseconds since
    /// construction.
    pub fn last_refresh_us(&self) -> u64 {
        self.last_refresh_us.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_watchdog_is_not_expired() {
        let wd = TargetWatchdog::new(Duration::from_millis(100));
        assert!(!wd.expired_at(0));
        assert!(!wd.expired_at(100_000));
    }

    #[test]
    fn expires_after_timeout() {
        let wd = TargetWatchdog::new(Duration::from_millis(100));
        assert!(wd.expired_at(100_001));
    }

    #[test]
    fn refresh_rearms() {
        let wd = TargetWatchdog::new(Duration::from_millis(100));
        wd.refresh_at(500_000);
        assert!(!wd.expired_at(600_000));
        assert!(wd.expired_at(600_001));
    }

    #[test]
    fn time_before_last_refresh_is_not_stale() {
        // A refresh recorded "in the future" relative to a reader must not
        // underflow into a huge elapsed value.
        let wd = TargetWatchdog::new(Duration::from_millis(100));
        wd.refresh_at(1_000_000);
        assert!(!wd.expired_at(999_000));
    }
}
