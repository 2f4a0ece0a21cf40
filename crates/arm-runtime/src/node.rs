use crate::{Clock, NodeConfig, NodeMetrics};
use anyhow::Context;
use arm_protocol::{
    encode_telemetry, handle_frame, Dispatched, ProtocolError, ProtocolIds, Telemetry,
};
use can_transport::{CanBus, CanId, TransportError};
use joint_control::hal::DigitalOutput;
use joint_control::{ControlMode, Health, JointRegistry, JointStatus};
use safety_guard::{
    CommsWatchdog, SafetyEvent, SafetyEventType, ViolationSeverity, Watchdog, WatchdogStatus,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// What happened to the frame polled in one step.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Applied(Dispatched),
    Rejected(ProtocolError),
    /// Outside this node's command block.
    Ignored(CanId),
}

/// Result of one loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub tick: u64,
    pub now: Duration,
    pub frame: Option<FrameOutcome>,
    pub watchdog: WatchdogStatus,
    /// The watchdog tripped in this step and every joint was stopped.
    pub failsafe_tripped: bool,
    pub telemetry_sent: usize,
    pub statuses: Vec<JointStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub failsafe_trips: u64,
    pub telemetry_frames: u64,
    /// Steps that finished after their deadline.
    pub overruns: u64,
}

/// The node's cooperative control loop: one bus poll, one watchdog check,
/// periodic telemetry and one update of every joint per step.
pub struct ArmNode<B: CanBus, C: Clock> {
    name: String,
    ids: ProtocolIds,
    bus: B,
    clock: C,
    registry: JointRegistry,
    watchdog: CommsWatchdog,
    metrics: NodeMetrics,
    led: Option<Box<dyn DigitalOutput>>,
    update_period: Duration,
    telemetry_period: Duration,
    last_telemetry: Duration,
    health: Vec<Health>,
    tick: u64,
}

impl<B: CanBus, C: Clock> ArmNode<B, C> {
    pub fn new(
        config: &NodeConfig,
        mut bus: B,
        clock: C,
        mut registry: JointRegistry,
    ) -> anyhow::Result<Self> {
        config.validate().context("invalid node config")?;
        let ids = config.protocol_ids()?;
        if registry.len() != ids.joint_count() {
            anyhow::bail!(
                "registry holds {} joints, config describes {}",
                registry.len(),
                ids.joint_count()
            );
        }

        let filter = ids.filter(config.can.filter_mask)?;
        match bus.set_filters(&[filter]) {
            Ok(()) => debug!(node = %config.name, ?filter, "acceptance filter applied"),
            Err(TransportError::Unsupported(why)) => debug!(
                node = %config.name,
                why = %why,
                "bus has no acceptance filters; filtering in software"
            ),
            Err(e) => return Err(e).context("setting acceptance filter"),
        }

        for joint in registry.iter_mut() {
            joint.set_control_mode(ControlMode::DutyCycle);
        }

        let now = clock.now();
        let watchdog = CommsWatchdog::new(
            format!("{}_can_watchdog", config.name),
            config.watchdog_timeout(),
            now,
        );
        let metrics = NodeMetrics::new().context("registering metrics")?;
        let health = registry.iter().map(|j| j.health()).collect();
        info!(
            node = %config.name,
            joints = registry.len(),
            command_base = %format!("0x{:03X}", ids.command_base()),
            telemetry_base = %format!("0x{:03X}", ids.telemetry_base()),
            "arm node started"
        );

        Ok(Self {
            name: config.name.clone(),
            ids,
            bus,
            clock,
            registry,
            watchdog,
            metrics,
            led: None,
            update_period: config.update_period(),
            telemetry_period: config.telemetry_period(),
            last_telemetry: now,
            health,
            tick: 0,
        })
    }

    /// Toggle `led` on every received command.
    pub fn with_activity_led(mut self, led: Box<dyn DigitalOutput>) -> Self {
        self.led = Some(led);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ids(&self) -> &ProtocolIds {
        &self.ids
    }

    pub fn registry(&self) -> &JointRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut JointRegistry {
        &mut self.registry
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn step(&mut self) -> StepReport {
        let now = self.clock.now();
        self.tick += 1;

        let frame = self.poll(now);
        let (watchdog, failsafe_tripped) = self.check_watchdog(now);

        let mut telemetry_sent = 0;
        if now.saturating_sub(self.last_telemetry) >= self.telemetry_period {
            telemetry_sent = self.send_telemetry();
            self.last_telemetry = now;
        }

        let statuses = self.registry.update_all();
        self.track_health(&statuses);

        StepReport {
            tick: self.tick,
            now,
            frame,
            watchdog,
            failsafe_tripped,
            telemetry_sent,
            statuses,
        }
    }

    /// Step at the update period until `max_ticks` steps ran or `stop` is raised.
    pub fn run(&mut self, max_ticks: Option<u64>, stop: &AtomicBool) -> RunSummary {
        self.run_with(max_ticks, stop, |_| {})
    }

    /// Like [`Self::run`], handing every report to `on_step` before pacing.
    pub fn run_with<F>(
        &mut self,
        max_ticks: Option<u64>,
        stop: &AtomicBool,
        mut on_step: F,
    ) -> RunSummary
    where
        F: FnMut(&StepReport),
    {
        let mut summary = RunSummary::default();
        let mut deadline = self.clock.now();
        loop {
            if max_ticks.is_some_and(|max| summary.ticks >= max) || stop.load(Ordering::Relaxed) {
                break;
            }
            let report = self.step();
            summary.ticks += 1;
            summary.telemetry_frames += report.telemetry_sent as u64;
            if report.failsafe_tripped {
                summary.failsafe_trips += 1;
            }
            on_step(&report);

            deadline += self.update_period;
            let now = self.clock.now();
            if let Some(wait) = deadline.checked_sub(now) {
                self.clock.sleep(wait);
            } else {
                summary.overruns += 1;
                debug!(
                    tick = report.tick,
                    late_ms = (now - deadline).as_millis() as u64,
                    "control step overran"
                );
                deadline = now;
            }
        }
        info!(
            node = %self.name,
            ticks = summary.ticks,
            trips = summary.failsafe_trips,
            "control loop finished"
        );
        summary
    }

    fn poll(&mut self, now: Duration) -> Option<FrameOutcome> {
        let frame = match self.bus.try_recv() {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(e) => {
                warn!(node = %self.name, error = %e, "bus receive failed");
                return None;
            }
        };
        self.metrics.rx_frames.inc();

        if self.ids.classify(frame.id).is_none() {
            trace!(node = %self.name, %frame, "ignoring frame outside command block");
            return Some(FrameOutcome::Ignored(frame.id));
        }
        trace!(node = %self.name, %frame, "command frame");

        if let Some(silent_for) = self.watchdog.record_message(now) {
            SafetyEvent::watchdog_recovered(self.watchdog.name(), silent_for).log();
        }
        if let Some(led) = self.led.as_mut() {
            led.toggle();
        }

        match handle_frame(&self.ids, &mut self.registry, &frame) {
            Ok(dispatched) => Some(FrameOutcome::Applied(dispatched)),
            Err(e) => {
                warn!(node = %self.name, id = %frame.id, error = %e, "command rejected");
                self.metrics.commands_rejected.inc();
                Some(FrameOutcome::Rejected(e))
            }
        }
    }

    fn check_watchdog(&mut self, now: Duration) -> (WatchdogStatus, bool) {
        let status = self.watchdog.check(now);
        if !self.watchdog.tripped() {
            return (status, false);
        }
        SafetyEvent::watchdog_failure(&status).log();
        self.registry.stop_all();
        self.metrics.failsafe_trips.inc();
        SafetyEvent::new(
            SafetyEventType::EmergencyStop,
            ViolationSeverity::Critical,
            format!("All {} joints stopped after loss of commands", self.registry.len()),
        )
        .with_context("node", self.name.as_str())
        .log();
        (status, true)
    }

    fn send_telemetry(&mut self) -> usize {
        let mut sent = 0;
        for (index, joint) in self.registry.iter().enumerate() {
            let telemetry = Telemetry {
                joint: index,
                angle_deg: joint.angle_degrees(),
                health: joint.health(),
            };
            let frame = match encode_telemetry(&self.ids, &telemetry) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(joint = %joint.name(), error = %e, "telemetry encode failed");
                    continue;
                }
            };
            match self.bus.send(&frame) {
                Ok(()) => {
                    self.metrics.tx_frames.inc();
                    sent += 1;
                }
                Err(e) => {
                    self.metrics.tx_errors.inc();
                    warn!(
                        joint = %joint.name(),
                        id = %frame.id,
                        error = %e,
                        "telemetry send failed"
                    );
                }
            }
        }
        sent
    }

    fn track_health(&mut self, statuses: &[JointStatus]) {
        for (prev, status) in self.health.iter_mut().zip(statuses) {
            if status.health == Health::Fault && *prev != Health::Fault {
                self.metrics.joint_faults.inc();
            }
            *prev = status.health;
        }
    }
}
