//! safety-guard: watchdog monitoring for the arm joint nodes
//!
//! A node feeds a [`CommsWatchdog`] with every command it receives and checks
//! it once per control tick; the first failed check is the signal to put all
//! joints into their fail-safe state. Failures and recoveries are described
//! as [`SafetyEvent`]s for the audit log.

mod types;
pub use types::{SafetyEvent, SafetyEventType, ViolationSeverity, WatchdogStatus};

mod watchdogs;
pub use watchdogs::{CommsWatchdog, Watchdog};
