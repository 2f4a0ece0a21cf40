//! A complete node on the mock bus with simulated joints, for the CLI and tests.

use crate::{ArmNode, Clock, NodeConfig, RunSummary, StepReport};
use anyhow::Context;
use can_transport::{CanBus, MockBus, MockBusHandle};
use joint_control::sim::{MemoryPin, SimJoint};
use joint_control::{JointController, JointRegistry};
use std::sync::atomic::AtomicBool;

pub struct SimNode<C: Clock> {
    pub node: ArmNode<MockBus, C>,
    pub bus: MockBusHandle,
    pub joints: Vec<SimJoint>,
    pub led: MemoryPin,
    dt_s: f32,
}

impl<C: Clock> SimNode<C> {
    /// Wire one [`SimJoint`] per configured joint, each moving at up to `max_speed_dps`.
    pub fn build(config: &NodeConfig, clock: C, max_speed_dps: f32) -> anyhow::Result<Self> {
        let bus = MockBus::open(&config.can.device)?;
        let handle = bus.handle();

        let mut registry = JointRegistry::default();
        let mut joints = Vec::with_capacity(config.joints.len());
        for joint in &config.joints {
            let sim = SimJoint::new(joint, max_speed_dps);
            let controller = JointController::new(joint.clone(), sim.pins())
                .with_context(|| format!("building joint '{}'", joint.name))?;
            registry.push(controller);
            joints.push(sim);
        }

        let led = MemoryPin::default();
        let mut node = ArmNode::new(config, bus, clock, registry)?;
        if config.activity_led_pin.is_some() {
            node = node.with_activity_led(Box::new(led.clone()));
        }

        Ok(Self {
            node,
            bus: handle,
            joints,
            led,
            dt_s: config.update_period().as_secs_f32(),
        })
    }

    /// One node step followed by one update period of plant motion.
    pub fn step(&mut self) -> StepReport {
        let report = self.node.step();
        self.advance_plants();
        report
    }

    pub fn run_with<F>(
        &mut self,
        max_ticks: Option<u64>,
        stop: &AtomicBool,
        mut on_step: F,
    ) -> RunSummary
    where
        F: FnMut(&StepReport),
    {
        let joints = &self.joints;
        let dt_s = self.dt_s;
        self.node.run_with(max_ticks, stop, |report| {
            for joint in joints {
                joint.step(dt_s);
            }
            on_step(report);
        })
    }

    fn advance_plants(&self) {
        for joint in &self.joints {
            joint.step(self.dt_s);
        }
    }
}
