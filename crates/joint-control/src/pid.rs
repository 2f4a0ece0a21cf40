//! Discrete-time PID control law.
//!
//! The controller trusts its caller to evaluate it once per configured
//! interval; it never reads a clock. Output is unbounded: saturation is the
//! caller's job.

use crate::PidGains;

#[derive(Debug, Clone)]
pub struct Pid {
    gains: PidGains,
    integral: f32,
    prev_error: f32,
}

impl Pid {
    /// `gains.interval_s` must be positive (checked by `JointConfig::validate`).
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            prev_error: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }

    pub fn evaluate(&mut self, setpoint: f32, measured: f32) -> f32 {
        let dt = self.gains.interval_s;
        let error = setpoint - measured;
        self.integral += error * dt;
        let derivative = (error - self.prev_error) / dt;
        self.prev_error = error;

        self.gains.p * error + self.gains.i * self.integral + self.gains.d * derivative
            + self.gains.bias
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }
}
