use crate::actuator::MotorActuator;
use crate::hal::JointPins;
use crate::limits::LimitSwitches;
use crate::pid::Pid;
use crate::sensor::AngleSensor;
use crate::{
    ConfigError, ControlMode, Health, JointConfig, JointError, JointStatus, MotionSetpoint, Result,
};
use tracing::{debug, info, warn};

/// Closed-loop controller for one joint.
///
/// Commands (mode and setpoint changes) only mutate state; the actuator is
/// driven exclusively from [`JointController::update`], so a command takes
/// effect on the next tick.
///
/// After [`JointController::stop`] the joint is latched: setpoints are
/// rejected until a control mode is set again.
pub struct JointController {
    config: JointConfig,
    mode: ControlMode,
    stopped: bool,
    setpoint: f32,
    angle_deg: f32,
    prev_angle_deg: Option<f32>,
    duty_cycle: f32,
    health: Health,
    velocity_pid: Pid,
    position_pid: Pid,
    sensor: AngleSensor,
    motor: MotorActuator,
    limits: LimitSwitches,
}

impl JointController {
    /// Build a controller in `DutyCycle` mode with the motor stopped.
    pub fn new(config: JointConfig, pins: JointPins) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut sensor = AngleSensor::new(&config.encoder, pins.encoder);
        let reading = sensor.read();
        let motor = MotorActuator::new(&config.motor, pins.motor_pwm, pins.motor_dir);
        Ok(Self {
            mode: ControlMode::DutyCycle,
            stopped: false,
            setpoint: 0.0,
            angle_deg: reading.degrees,
            prev_angle_deg: None,
            duty_cycle: 0.0,
            health: reading.health,
            velocity_pid: Pid::new(config.velocity_pid),
            position_pid: Pid::new(config.position_pid),
            sensor,
            motor,
            limits: LimitSwitches::new(pins.lim_min, pins.lim_max),
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &JointConfig {
        &self.config
    }

    pub fn control_mode(&self) -> ControlMode {
        self.mode
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    /// Angle measured by the most recent tick.
    pub fn angle_degrees(&self) -> f32 {
        self.angle_deg
    }

    /// Signed duty cycle sent to the motor by the most recent tick.
    pub fn duty_cycle(&self) -> f32 {
        self.duty_cycle
    }

    pub fn health(&self) -> Health {
        self.health
    }

    /// Latched by [`Self::stop`], cleared by the next control mode command.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Switch control law. Entering a closed-loop mode clears that loop's PID
    /// state and seeds a setpoint that holds the joint where it is. Any mode,
    /// including the current one, releases a fail-safe stop.
    pub fn set_control_mode(&mut self, mode: ControlMode) {
        if self.stopped {
            self.stopped = false;
            info!(joint = %self.config.name, to = %mode, "joint released from stop");
        }
        if mode == self.mode {
            return;
        }
        self.setpoint = match mode {
            ControlMode::DutyCycle => 0.0,
            ControlMode::VelocityPid => {
                self.velocity_pid.reset();
                0.0
            }
            ControlMode::PositionPid => {
                self.position_pid.reset();
                self.clamp_angle(self.angle_deg)
            }
        };
        info!(joint = %self.config.name, from = %self.mode, to = %mode, "control mode changed");
        self.mode = mode;
    }

    /// Like [`Self::set_control_mode`] but from a wire byte; unknown bytes leave the mode as is.
    pub fn set_control_mode_raw(&mut self, raw: u8) -> Result<ControlMode> {
        let mode = ControlMode::try_from(raw)?;
        self.set_control_mode(mode);
        Ok(mode)
    }

    pub fn set_motor_duty_cycle(&mut self, duty: f32) -> Result<f32> {
        self.check_setpoint(ControlMode::DutyCycle, duty)?;
        self.setpoint = duty.clamp(-1.0, 1.0);
        Ok(self.setpoint)
    }

    pub fn set_velocity_degrees_per_sec(&mut self, dps: f32) -> Result<f32> {
        self.check_setpoint(ControlMode::VelocityPid, dps)?;
        self.setpoint = dps.clamp(
            self.config.min_input_velocity_dps,
            self.config.max_input_velocity_dps,
        );
        Ok(self.setpoint)
    }

    pub fn set_angle_degrees(&mut self, deg: f32) -> Result<f32> {
        self.check_setpoint(ControlMode::PositionPid, deg)?;
        self.setpoint = self.clamp_angle(deg);
        Ok(self.setpoint)
    }

    /// Route a tagged setpoint to its setter.
    pub fn apply_motion(&mut self, motion: MotionSetpoint) -> Result<f32> {
        match motion {
            MotionSetpoint::DutyCycle(v) => self.set_motor_duty_cycle(v),
            MotionSetpoint::VelocityDegPerSec(v) => self.set_velocity_degrees_per_sec(v),
            MotionSetpoint::AngleDeg(v) => self.set_angle_degrees(v),
        }
    }

    /// Fail-safe: open loop, zero output, motor idle immediately. Setpoints
    /// are refused until the next control mode command.
    pub fn stop(&mut self) {
        if !self.stopped {
            info!(joint = %self.config.name, from = %self.mode, "joint stopped");
        }
        self.stopped = true;
        self.mode = ControlMode::DutyCycle;
        self.setpoint = 0.0;
        self.duty_cycle = 0.0;
        self.motor.stop();
    }

    /// One control tick: sense, compute, clamp to limits, drive.
    pub fn update(&mut self) -> JointStatus {
        let reading = self.sensor.read();
        let limits = self.limits.sample();
        let health = reading.health.worst(limits.health());
        let angle = reading.degrees;

        // A faulted angle is not a measurement; restart the estimate and the
        // active loop once feedback is back.
        let velocity = if health == Health::Fault {
            self.prev_angle_deg = None;
            0.0
        } else {
            if self.health == Health::Fault {
                match self.mode {
                    ControlMode::DutyCycle => {}
                    ControlMode::VelocityPid => self.velocity_pid.reset(),
                    ControlMode::PositionPid => self.position_pid.reset(),
                }
            }
            let velocity = match self.prev_angle_deg {
                Some(prev) => (angle - prev) / self.config.velocity_pid.interval_s,
                None => 0.0,
            };
            self.prev_angle_deg = Some(angle);
            velocity
        };

        let output = match self.mode {
            ControlMode::DutyCycle => self.setpoint,
            _ if health == Health::Fault => 0.0,
            ControlMode::VelocityPid => self
                .velocity_pid
                .evaluate(self.setpoint, velocity)
                .clamp(
                    self.config.min_output_duty_cycle,
                    self.config.max_output_duty_cycle,
                ),
            ControlMode::PositionPid => self
                .position_pid
                .evaluate(self.setpoint, angle)
                .clamp(-1.0, 1.0),
        };

        let duty = limits.clamp(output);
        let limit_clamped = duty != output;
        if limit_clamped {
            debug!(joint = %self.config.name, output, ?limits, "output held at limit switch");
        }
        self.motor.drive(duty);

        if health != self.health {
            if health == Health::Ok {
                info!(joint = %self.config.name, "feedback healthy again");
            } else {
                warn!(
                    joint = %self.config.name,
                    ?health,
                    raw_duty = reading.raw_duty_cycle,
                    ?limits,
                    "feedback health changed"
                );
            }
        }

        self.angle_deg = angle;
        self.duty_cycle = duty;
        self.health = health;

        JointStatus {
            mode: self.mode,
            angle_deg: angle,
            duty_cycle: duty,
            health,
            limit_clamped,
        }
    }

    fn check_setpoint(&self, expected: ControlMode, value: f32) -> Result<()> {
        if !value.is_finite() {
            return Err(JointError::NonFinite(value));
        }
        if self.stopped {
            return Err(JointError::Stopped);
        }
        if self.mode != expected {
            return Err(JointError::ModeMismatch {
                expected,
                actual: self.mode,
            });
        }
        Ok(())
    }

    fn clamp_angle(&self, deg: f32) -> f32 {
        deg.clamp(
            self.config.encoder.min_angle_deg,
            self.config.encoder.max_angle_deg,
        )
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::config::tests::sample_joint;
    use crate::sim::SimJoint;

    fn joint() -> (JointController, SimJoint) {
        let cfg = sample_joint("shoulder");
        let sim = SimJoint::new(&cfg, 90.0);
        let ctrl = JointController::new(cfg, sim.pins()).unwrap();
        (ctrl, sim)
    }

    #[test]
    fn test_starts_idle_in_duty_cycle() {
        let (ctrl, sim) = joint();
        assert_eq!(ctrl.control_mode(), ControlMode::DutyCycle);
        assert_eq!(ctrl.setpoint(), 0.0);
        assert_eq!(sim.applied_duty(), 0.0);
    }

    #[test]
    fn test_unknown_mode_byte_leaves_mode_unchanged() {
        let (mut ctrl, _sim) = joint();
        ctrl.set_control_mode(ControlMode::VelocityPid);
        assert_eq!(
            ctrl.set_control_mode_raw(9),
            Err(JointError::UnknownControlMode(9))
        );
        assert_eq!(ctrl.control_mode(), ControlMode::VelocityPid);
        assert_eq!(ctrl.set_control_mode_raw(2), Ok(ControlMode::PositionPid));
    }

    #[test]
    fn test_setters_clamp() {
        let (mut ctrl, _sim) = joint();
        assert_eq!(ctrl.set_motor_duty_cycle(1.7).unwrap(), 1.0);
        ctrl.set_control_mode(ControlMode::VelocityPid);
        assert_eq!(ctrl.set_velocity_degrees_per_sec(-50.0).unwrap(), -20.0);
        ctrl.set_control_mode(ControlMode::PositionPid);
        assert_eq!(ctrl.set_angle_degrees(250.0).unwrap(), 100.0);
    }

    #[test]
    fn test_setter_in_wrong_mode_is_rejected() {
        let (mut ctrl, _sim) = joint();
        ctrl.set_motor_duty_cycle(0.3).unwrap();
        let err = ctrl.set_angle_degrees(10.0).unwrap_err();
        assert_eq!(
            err,
            JointError::ModeMismatch {
                expected: ControlMode::PositionPid,
                actual: ControlMode::DutyCycle,
            }
        );
        assert_eq!(ctrl.setpoint(), 0.3);
        assert!(matches!(
            ctrl.set_motor_duty_cycle(f32::NAN),
            Err(JointError::NonFinite(_))
        ));
    }

    #[test]
    fn test_entering_position_mode_holds_current_angle() {
        let (mut ctrl, sim) = joint();
        sim.set_angle(30.0);
        ctrl.update();
        ctrl.set_control_mode(ControlMode::PositionPid);
        assert!((ctrl.setpoint() - 30.0).abs() < 1e-3);
        let status = ctrl.update();
        assert!(status.duty_cycle.abs() < 1e-3);
    }

    #[test]
    fn test_duty_cycle_mode_passes_setpoint_through() {
        let (mut ctrl, sim) = joint();
        ctrl.set_motor_duty_cycle(-0.4).unwrap();
        // Not applied until the next tick.
        assert_eq!(sim.applied_duty(), 0.0);
        let status = ctrl.update();
        assert_eq!(status.duty_cycle, -0.4);
        assert_eq!(sim.applied_duty(), -0.4);
        assert_eq!(ctrl.duty_cycle(), -0.4);
    }

    #[test]
    fn test_position_output_saturates() {
        let (mut ctrl, _sim) = joint();
        ctrl.set_control_mode(ControlMode::PositionPid);
        ctrl.set_angle_degrees(90.0).unwrap();
        // error 90 * p 0.05 = 4.5 before clamping
        assert_eq!(ctrl.update().duty_cycle, 1.0);
    }

    #[test]
    fn test_max_limit_zeroes_forward_output_only() {
        let (mut ctrl, sim) = joint();
        sim.set_limit_switches(false, true);
        ctrl.set_motor_duty_cycle(0.8).unwrap();
        let status = ctrl.update();
        assert_eq!(status.duty_cycle, 0.0);
        assert!(status.limit_clamped);
        assert_eq!(sim.applied_duty(), 0.0);

        ctrl.set_motor_duty_cycle(-0.8).unwrap();
        let status = ctrl.update();
        assert_eq!(status.duty_cycle, -0.8);
        assert!(!status.limit_clamped);
    }

    #[test]
    fn test_max_limit_clamps_closed_loop_output() {
        let (mut ctrl, sim) = joint();
        sim.set_limit_switches(false, true);
        ctrl.set_control_mode(ControlMode::PositionPid);
        ctrl.set_angle_degrees(60.0).unwrap();
        let status = ctrl.update();
        assert!(status.limit_clamped);
        assert_eq!(status.duty_cycle, 0.0);

        ctrl.set_angle_degrees(-60.0).unwrap();
        let status = ctrl.update();
        assert!(!status.limit_clamped);
        assert!(status.duty_cycle < 0.0);
    }

    #[test]
    fn test_sensor_fault_idles_closed_loop() {
        let (mut ctrl, sim) = joint();
        ctrl.set_control_mode(ControlMode::PositionPid);
        ctrl.set_angle_degrees(50.0).unwrap();
        sim.disconnect_encoder(true);
        let status = ctrl.update();
        assert_eq!(status.health, Health::Fault);
        assert_eq!(status.duty_cycle, 0.0);
        assert_eq!(ctrl.health(), Health::Fault);

        sim.disconnect_encoder(false);
        let status = ctrl.update();
        assert_eq!(status.health, Health::Ok);
        assert!(status.duty_cycle > 0.0);
    }

    #[test]
    fn test_velocity_mode_tracks_setpoint() {
        let mut cfg = sample_joint("elbow");
        cfg.velocity_pid.p = 0.005;
        cfg.velocity_pid.i = 0.02;
        let sim = SimJoint::new(&cfg, 90.0);
        let mut ctrl = JointController::new(cfg, sim.pins()).unwrap();
        ctrl.set_control_mode(ControlMode::VelocityPid);
        ctrl.set_velocity_degrees_per_sec(10.0).unwrap();
        for _ in 0..150 {
            ctrl.update();
            sim.step(0.05);
        }
        let before = ctrl.update().angle_deg;
        sim.step(0.05);
        let after = ctrl.update().angle_deg;
        let v = (after - before) / 0.05;
        assert!((v - 10.0).abs() < 0.5, "velocity {v}");
    }

    #[test]
    fn test_stop_forces_idle() {
        let (mut ctrl, sim) = joint();
        ctrl.set_control_mode(ControlMode::PositionPid);
        ctrl.set_angle_degrees(40.0).unwrap();
        ctrl.update();
        assert!(sim.applied_duty() > 0.0);
        ctrl.stop();
        assert_eq!(ctrl.control_mode(), ControlMode::DutyCycle);
        assert_eq!(ctrl.setpoint(), 0.0);
        assert_eq!(sim.applied_duty(), 0.0);
    }

    #[test]
    fn test_stop_latches_until_mode_command() {
        let (mut ctrl, sim) = joint();
        ctrl.set_control_mode(ControlMode::PositionPid);
        ctrl.set_angle_degrees(40.0).unwrap();
        ctrl.stop();
        assert!(ctrl.is_stopped());

        // An angle read as a duty cycle would saturate the motor.
        assert_eq!(ctrl.set_motor_duty_cycle(10.0), Err(JointError::Stopped));
        assert_eq!(ctrl.setpoint(), 0.0);
        assert_eq!(ctrl.update().duty_cycle, 0.0);
        assert_eq!(sim.applied_duty(), 0.0);

        // Re-selecting the mode the stop left behind also releases it.
        ctrl.set_control_mode(ControlMode::DutyCycle);
        assert!(!ctrl.is_stopped());
        assert_eq!(ctrl.set_motor_duty_cycle(0.2), Ok(0.2));
    }

    #[test]
    fn test_velocity_loop_restarts_after_sensor_fault() {
        let mut cfg = sample_joint("shoulder");
        cfg.velocity_pid.p = 0.005;
        cfg.velocity_pid.i = 0.02;
        let sim = SimJoint::new(&cfg, 90.0);
        let mut ctrl = JointController::new(cfg, sim.pins()).unwrap();
        sim.set_angle(70.0);
        ctrl.set_control_mode(ControlMode::VelocityPid);
        for _ in 0..3 {
            ctrl.update();
            sim.step(0.05);
        }

        // One tick without feedback: the reading parks at the range edge.
        sim.disconnect_encoder(true);
        let status = ctrl.update();
        assert_eq!(status.health, Health::Fault);
        assert_eq!(status.duty_cycle, 0.0);
        sim.step(0.05);
        sim.disconnect_encoder(false);

        for _ in 0..20 {
            let status = ctrl.update();
            assert_eq!(status.health, Health::Ok);
            assert!(status.duty_cycle.abs() < 1e-3, "duty {}", status.duty_cycle);
            sim.step(0.05);
        }
        assert!((sim.angle_deg() - 70.0).abs() < 0.1, "angle {}", sim.angle_deg());
    }
}
