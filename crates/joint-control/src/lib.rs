//! joint-control: closed-loop control of one arm joint
//!
//! Each joint combines a duty-cycle encoded angle sensor, a PWM + direction
//! motor driver and a pair of limit switches under one of three control modes
//! (raw duty cycle, velocity PID, position PID). Hardware is reached through
//! the traits in [`hal`]; the `sim` feature provides an in-memory plant.

mod types;
pub use types::{ControlMode, Health, JointStatus, MotionSetpoint};

mod error;
pub use error::{ConfigError, JointError, Result};

mod config;
pub use config::{EncoderConfig, JointConfig, MotorConfig, PidGains};

pub mod hal;

pub mod pid;
pub use pid::Pid;

mod sensor;
pub use sensor::{AngleReading, AngleSensor};

mod actuator;
pub use actuator::{DriveCommand, MotorActuator};

mod limits;
pub use limits::{LimitState, LimitSwitches};

mod controller;
pub use controller::JointController;

mod registry;
pub use registry::JointRegistry;

#[cfg(feature = "sim")]
pub mod sim;
