//! Hardware seams consumed by the joint components.
//!
//! Writes are fire-and-forget: a pin either takes the value or the board is
//! broken, and neither case is something the control loop can retry.

/// PWM capture input reporting the measured duty cycle in `[0, 1]`.
pub trait PwmInput {
    fn duty_cycle(&mut self) -> f32;
}

/// PWM generator.
pub trait PwmOutput {
    fn set_frequency_hz(&mut self, hz: f32);
    fn set_duty_cycle(&mut self, duty: f32);
}

pub trait DigitalInput {
    fn is_high(&mut self) -> bool;
}

pub trait DigitalOutput {
    fn set_high(&mut self, high: bool);

    fn toggle(&mut self) -> bool;
}

/// The pins one joint needs, already resolved from its configuration.
pub struct JointPins {
    pub motor_pwm: Box<dyn PwmOutput>,
    pub motor_dir: Box<dyn DigitalOutput>,
    pub encoder: Box<dyn PwmInput>,
    pub lim_min: Box<dyn DigitalInput>,
    pub lim_max: Box<dyn DigitalInput>,
}
