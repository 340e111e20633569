//! Idle monitor.
//!
//! A single re-arming timer per connection. Each time it fires the
//! connection compares the time since the last completed read and the last
//! completed write against the timeout.

use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep_until, Instant, Sleep};

/// Outcome of an idle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdleVerdict {
    /// Both directions saw activity recently enough.
    Alive,
    /// Nothing was read for longer than the timeout.
    ReadTimeout,
    /// Nothing was written for longer than the timeout.
    WriteTimeout,
}

#[derive(Debug)]
pub(crate) struct IdleMonitor {
    timeout: Duration,
    timer: Pin<Box<Sleep>>,
    armed: bool,
}

impl IdleMonitor {
    /// Create a disarmed monitor.
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            timer: Box::pin(sleep_until(Instant::now() + timeout)),
            armed: false,
        }
    }

    /// Schedule the next check one period from now.
    pub(crate) fn arm(&mut self) {
        self.timer.as_mut().reset(Instant::now() + self.timeout);
        self.armed = true;
    }

    pub(crate) fn cancel(&mut self) {
        self.armed = false;
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed
    }

    /// Wait for the pending timer.
    ///
    /// Only poll this while [`is_armed`](Self::is_armed). Once the timer has
    /// fired the monitor is disarmed until the next [`arm`](Self::arm).
    pub(crate) async fn expired(&mut self) {
        self.timer.as_mut().await;
        self.armed = false;
    }

    /// Classify activity as of `now`.
    ///
    /// Read silence is checked first, so it wins when both directions are
    /// over the limit. Exactly `timeout` of silence is still alive.
    pub(crate) fn check(&self, now: Instant, last_read: Instant, last_write: Instant) -> IdleVerdict {
        if now.saturating_duration_since(last_read) > self.timeout {
            IdleVerdict::ReadTimeout
        } else if now.saturating_duration_since(last_write) > self.timeout {
            IdleVerdict::WriteTimeout
        } else {
            IdleVerdict::Alive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);
    const EPSILON: Duration = Duration::from_millis(1);

    #[tokio::test(start_paused = true)]
    async fn test_check_thresholds() {
        let monitor = IdleMonitor::new(TIMEOUT);
        let start = Instant::now();

        assert_eq!(
            monitor.check(start + TIMEOUT - EPSILON, start, start),
            IdleVerdict::Alive
        );
        assert_eq!(monitor.check(start + TIMEOUT, start, start), IdleVerdict::Alive);
        assert_eq!(
            monitor.check(start + TIMEOUT + EPSILON, start, start + TIMEOUT),
            IdleVerdict::ReadTimeout
        );
        assert_eq!(
            monitor.check(start + TIMEOUT + EPSILON, start + TIMEOUT, start),
            IdleVerdict::WriteTimeout
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_takes_priority() {
        let monitor = IdleMonitor::new(TIMEOUT);
        let start = Instant::now();
        assert_eq!(
            monitor.check(start + TIMEOUT * 2, start, start),
            IdleVerdict::ReadTimeout
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_one_period() {
        let mut monitor = IdleMonitor::new(TIMEOUT);
        assert!(!monitor.is_armed());

        let start = Instant::now();
        monitor.arm();
        assert!(monitor.is_armed());
        monitor.expired().await;

        assert!(!monitor.is_armed());
        assert_eq!(Instant::now() - start, TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms() {
        let mut monitor = IdleMonitor::new(TIMEOUT);
        monitor.arm();
        monitor.cancel();
        assert!(!monitor.is_armed());
    }
}
