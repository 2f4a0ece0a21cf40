use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Motor driver wiring and output cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    pub pwm_pin: String,
    pub dir_pin: String,
    #[serde(default)]
    pub inverted: bool,
    pub freq_hz: f32,
    /// Output magnitude cap, 0 to 1.
    #[serde(default = "default_motor_limit")]
    pub limit: f32,
}

/// Duty-cycle encoded absolute angle sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub pwm_pin: String,
    pub zero_angle_duty_cycle: f32,
    pub min_angle_deg: f32,
    pub max_angle_deg: f32,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default = "default_degrees_per_duty_cycle")]
    pub degrees_per_duty_cycle: f32,
    /// How far outside the range a reading may stray before it counts as a fault.
    #[serde(default = "default_fault_margin_deg")]
    pub fault_margin_deg: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
    #[serde(default)]
    pub bias: f32,
    pub interval_s: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointConfig {
    pub name: String,
    pub motor: MotorConfig,
    pub encoder: EncoderConfig,
    pub lim_switch_min_pin: String,
    pub lim_switch_max_pin: String,
    pub velocity_pid: PidGains,
    pub position_pid: PidGains,
    pub min_input_velocity_dps: f32,
    pub max_input_velocity_dps: f32,
    #[serde(default = "default_min_output")]
    pub min_output_duty_cycle: f32,
    #[serde(default = "default_max_output")]
    pub max_output_duty_cycle: f32,
}

fn default_motor_limit() -> f32 {
    1.0
}
fn default_degrees_per_duty_cycle() -> f32 {
    360.0
}
fn default_fault_margin_deg() -> f32 {
    5.0
}
fn default_min_output() -> f32 {
    -1.0
}
fn default_max_output() -> f32 {
    1.0
}

impl PidGains {
    fn validate(&self, joint: &str, which: &str) -> Result<(), ConfigError> {
        for (field, v) in [
            ("p", self.p),
            ("i", self.i),
            ("d", self.d),
            ("bias", self.bias),
            ("interval_s", self.interval_s),
        ] {
            if !v.is_finite() {
                return Err(ConfigError::new(
                    joint,
                    format!("{which}.{field} is not finite"),
                ));
            }
        }
        if self.interval_s <= 0.0 {
            return Err(ConfigError::new(
                joint,
                format!("{which}.interval_s must be positive, got {}", self.interval_s),
            ));
        }
        Ok(())
    }
}

impl JointConfig {
    /// Check the startup preconditions the control code relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.name.as_str();
        if name.is_empty() {
            return Err(ConfigError::new(name, "joint name is empty"));
        }
        let enc = &self.encoder;
        let finite = [
            ("motor.freq_hz", self.motor.freq_hz),
            ("motor.limit", self.motor.limit),
            ("encoder.zero_angle_duty_cycle", enc.zero_angle_duty_cycle),
            ("encoder.min_angle_deg", enc.min_angle_deg),
            ("encoder.max_angle_deg", enc.max_angle_deg),
            ("encoder.degrees_per_duty_cycle", enc.degrees_per_duty_cycle),
            ("encoder.fault_margin_deg", enc.fault_margin_deg),
            ("min_input_velocity_dps", self.min_input_velocity_dps),
            ("max_input_velocity_dps", self.max_input_velocity_dps),
            ("min_output_duty_cycle", self.min_output_duty_cycle),
            ("max_output_duty_cycle", self.max_output_duty_cycle),
        ];
        for (field, v) in finite {
            if !v.is_finite() {
                return Err(ConfigError::new(name, format!("{field} is not finite")));
            }
        }
        if self.motor.freq_hz <= 0.0 {
            return Err(ConfigError::new(name, "motor.freq_hz must be positive"));
        }
        if !(0.0..=1.0).contains(&self.motor.limit) {
            return Err(ConfigError::new(name, "motor.limit must lie in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&enc.zero_angle_duty_cycle) {
            return Err(ConfigError::new(
                name,
                "encoder.zero_angle_duty_cycle must lie in [0, 1]",
            ));
        }
        if enc.min_angle_deg >= enc.max_angle_deg {
            return Err(ConfigError::new(
                name,
                format!(
                    "encoder range is empty: min {} >= max {}",
                    enc.min_angle_deg, enc.max_angle_deg
                ),
            ));
        }
        if enc.degrees_per_duty_cycle <= 0.0 {
            return Err(ConfigError::new(
                name,
                "encoder.degrees_per_duty_cycle must be positive",
            ));
        }
        if enc.fault_margin_deg < 0.0 {
            return Err(ConfigError::new(name, "encoder.fault_margin_deg is negative"));
        }
        if self.min_input_velocity_dps > self.max_input_velocity_dps {
            return Err(ConfigError::new(name, "input velocity range is inverted"));
        }
        if self.min_output_duty_cycle > self.max_output_duty_cycle {
            return Err(ConfigError::new(name, "output duty cycle range is inverted"));
        }
        self.velocity_pid.validate(name, "velocity_pid")?;
        self.position_pid.validate(name, "position_pid")?;
        Ok(())
    }
}
