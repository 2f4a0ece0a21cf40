use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Severity levels for safety events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViolationSeverity {
    Warning,
    Error,
    Critical,
    Emergency,
}

/// Watchdog status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchdogStatus {
    pub name: String,
    pub healthy: bool,
    /// Time since the watchdog was last fed.
    pub elapsed: Duration,
    pub last_error: Option<String>,
    pub timeout_duration: Duration,
    pub consecutive_failures: u32,
}

/// Safety event for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyEvent {
    pub timestamp: SystemTime,
    pub event_type: SafetyEventType,
    pub message: String,
    pub severity: ViolationSeverity,
    pub context: HashMap<String, serde_json::Value>,
}

/// Types of safety events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SafetyEventType {
    WatchdogFailure,
    EmergencyStop,
    SystemRecovery,
}

impl std::fmt::Display for SafetyEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SafetyEventType::WatchdogFailure => write!(f, "WatchdogFailure"),
            SafetyEventType::EmergencyStop => write!(f, "EmergencyStop"),
            SafetyEventType::SystemRecovery => write!(f, "SystemRecovery"),
        }
    }
}

impl SafetyEvent {
    pub fn new(
        event_type: SafetyEventType,
        severity: ViolationSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: SystemTime::now(),
            event_type,
            message: message.into(),
            severity,
            context: HashMap::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    /// A watchdog went unhealthy.
    pub fn watchdog_failure(status: &WatchdogStatus) -> Self {
        Self::new(
            SafetyEventType::WatchdogFailure,
            ViolationSeverity::Critical,
            format!(
                "Watchdog '{}' failed: {}",
                status.name,
                status.last_error.as_deref().unwrap_or("unknown error")
            ),
        )
        .with_context("watchdog", status.name.as_str())
        .with_context("elapsed_ms", status.elapsed.as_millis() as u64)
        .with_context("timeout_ms", status.timeout_duration.as_millis() as u64)
    }

    /// A watchdog was fed again after failing.
    pub fn watchdog_recovered(name: &str, silent_for: Duration) -> Self {
        Self::new(
            SafetyEventType::SystemRecovery,
            ViolationSeverity::Warning,
            format!("Watchdog '{name}' recovered"),
        )
        .with_context("watchdog", name)
        .with_context("silent_ms", silent_for.as_millis() as u64)
    }

    /// Write the event to the log at a level matching its severity.
    pub fn log(&self) {
        let context = serde_json::to_string(&self.context).unwrap_or_default();
        match self.severity {
            ViolationSeverity::Warning => tracing::info!(
                event = %self.event_type,
                %context,
                "{}",
                self.message
            ),
            ViolationSeverity::Error => tracing::warn!(
                event = %self.event_type,
                %context,
                "{}",
                self.message
            ),
            ViolationSeverity::Critical | ViolationSeverity::Emergency => tracing::error!(
                event = %self.event_type,
                %context,
                "{}",
                self.message
            ),
        }
    }
}
