use crate::JointError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which control law drives a joint's actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ControlMode {
    /// Raw signed duty cycle straight to the motor.
    DutyCycle = 0,
    /// Closed loop on angular velocity (deg/s).
    VelocityPid = 1,
    /// Closed loop on angle (deg).
    PositionPid = 2,
}

impl ControlMode {
    pub const ALL: [ControlMode; 3] = [
        ControlMode::DutyCycle,
        ControlMode::VelocityPid,
        ControlMode::PositionPid,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ControlMode {
    type Error = JointError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(ControlMode::DutyCycle),
            1 => Ok(ControlMode::VelocityPid),
            2 => Ok(ControlMode::PositionPid),
            other => Err(JointError::UnknownControlMode(other)),
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::DutyCycle => write!(f, "duty_cycle"),
            ControlMode::VelocityPid => write!(f, "velocity_pid"),
            ControlMode::PositionPid => write!(f, "position_pid"),
        }
    }
}

/// Tri-state health of a joint's feedback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Health {
    Ok = 0,
    /// Reading slightly outside the calibrated range; value was clamped.
    Degraded = 1,
    /// Feedback cannot be trusted (disconnected sensor, stuck switches).
    Fault = 2,
}

impl Health {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a health byte; unknown values are treated as `Fault`.
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Health::Ok,
            1 => Health::Degraded,
            _ => Health::Fault,
        }
    }

    pub fn worst(self, other: Health) -> Health {
        self.max(other)
    }
}

/// A motion setpoint tagged with the control mode it is meant for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionSetpoint {
    DutyCycle(f32),
    VelocityDegPerSec(f32),
    AngleDeg(f32),
}

impl MotionSetpoint {
    /// Interpret a raw motion value under `mode`.
    pub fn for_mode(mode: ControlMode, value: f32) -> Self {
        match mode {
            ControlMode::DutyCycle => MotionSetpoint::DutyCycle(value),
            ControlMode::VelocityPid => MotionSetpoint::VelocityDegPerSec(value),
            ControlMode::PositionPid => MotionSetpoint::AngleDeg(value),
        }
    }

    pub fn mode(&self) -> ControlMode {
        match self {
            MotionSetpoint::DutyCycle(_) => ControlMode::DutyCycle,
            MotionSetpoint::VelocityDegPerSec(_) => ControlMode::VelocityPid,
            MotionSetpoint::AngleDeg(_) => ControlMode::PositionPid,
        }
    }

    pub fn value(&self) -> f32 {
        match *self {
            MotionSetpoint::DutyCycle(v)
            | MotionSetpoint::VelocityDegPerSec(v)
            | MotionSetpoint::AngleDeg(v) => v,
        }
    }
}

/// Outcome of one controller tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointStatus {
    pub mode: ControlMode,
    pub angle_deg: f32,
    pub duty_cycle: f32,
    pub health: Health,
    /// The computed output was zeroed by a limit switch this tick.
    pub limit_clamped: bool,
}
