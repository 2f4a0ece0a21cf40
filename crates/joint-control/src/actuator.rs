use crate::hal::{DigitalOutput, PwmOutput};
use crate::MotorConfig;

/// What was last written to the motor driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    /// Level written to the direction pin.
    pub forward: bool,
    pub magnitude: f32,
}

/// PWM + direction-pin motor driver.
pub struct MotorActuator {
    pwm: Box<dyn PwmOutput>,
    dir: Box<dyn DigitalOutput>,
    inverted: bool,
    limit: f32,
    last: DriveCommand,
}

impl MotorActuator {
    pub fn new(
        config: &MotorConfig,
        mut pwm: Box<dyn PwmOutput>,
        dir: Box<dyn DigitalOutput>,
    ) -> Self {
        pwm.set_frequency_hz(config.freq_hz);
        let mut motor = Self {
            pwm,
            dir,
            inverted: config.inverted,
            limit: config.limit,
            last: DriveCommand {
                forward: true,
                magnitude: 0.0,
            },
        };
        motor.stop();
        motor
    }

    /// Drive with a signed duty cycle in `[-1, 1]`; values outside are clamped.
    pub fn drive(&mut self, duty: f32) -> DriveCommand {
        let duty = if duty.is_finite() {
            duty.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        // Sign of zero counts as forward so an idle motor never chatters the pin.
        let forward = (duty >= 0.0) != self.inverted;
        let magnitude = duty.abs().min(self.limit);
        self.dir.set_high(forward);
        self.pwm.set_duty_cycle(magnitude);
        self.last = DriveCommand { forward, magnitude };
        self.last
    }

    pub fn stop(&mut self) {
        self.drive(0.0);
    }

    pub fn last_command(&self) -> DriveCommand {
        self.last
    }
}
