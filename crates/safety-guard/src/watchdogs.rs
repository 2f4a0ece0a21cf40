use crate::WatchdogStatus;
use std::time::Duration;

/// Base trait for all watchdogs.
///
/// Time is passed in as a monotonic offset from an arbitrary origin so a
/// watchdog never reads the wall clock itself.
pub trait Watchdog: Send {
    fn name(&self) -> &str;
    fn check(&mut self, now: Duration) -> WatchdogStatus;
    fn reset(&mut self, now: Duration);
    fn timeout_duration(&self) -> Duration;
}

/// Communication watchdog: unhealthy once no message has arrived for the timeout.
///
/// Armed at construction, so a node that never hears from the bus still trips.
#[derive(Debug, Clone)]
pub struct CommsWatchdog {
    name: String,
    timeout: Duration,
    last_message: Duration,
    consecutive_failures: u32,
    message_count: u64,
    tripped: bool,
}

impl CommsWatchdog {
    pub fn new(name: impl Into<String>, timeout: Duration, now: Duration) -> Self {
        Self {
            name: name.into(),
            timeout,
            last_message: now,
            consecutive_failures: 0,
            message_count: 0,
            tripped: false,
        }
    }

    /// Feed the watchdog. Returns how long the link had been silent if this
    /// message ends a trip.
    pub fn record_message(&mut self, now: Duration) -> Option<Duration> {
        let silent_for = now.saturating_sub(self.last_message);
        let recovered = self.consecutive_failures > 0;
        self.last_message = now;
        self.message_count += 1;
        self.consecutive_failures = 0;
        self.tripped = false;
        recovered.then_some(silent_for)
    }

    /// True when the most recent `check` was the first unhealthy one.
    pub fn tripped(&self) -> bool {
        self.tripped
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }
}

impl Watchdog for CommsWatchdog {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&mut self, now: Duration) -> WatchdogStatus {
        let elapsed = now.saturating_sub(self.last_message);
        let healthy = elapsed < self.timeout;

        let mut last_error = None;
        if !healthy {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            last_error = Some(format!(
                "No messages received for {} ms",
                elapsed.as_millis()
            ));
        } else {
            self.consecutive_failures = 0;
        }
        self.tripped = self.consecutive_failures == 1;

        WatchdogStatus {
            name: self.name.clone(),
            healthy,
            elapsed,
            last_error,
            timeout_duration: self.timeout,
            consecutive_failures: self.consecutive_failures,
        }
    }

    fn reset(&mut self, now: Duration) {
        self.last_message = now;
        self.consecutive_failures = 0;
        self.tripped = false;
    }

    fn timeout_duration(&self) -> Duration {
        self.timeout
    }
}
