use crate::ControlMode;
use thiserror::Error;

pub type Result<T, E = JointError> = core::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum JointError {
    #[error("unknown control mode: {0}")]
    UnknownControlMode(u8),
    #[error("setpoint for {expected:?} rejected while joint is in {actual:?}")]
    ModeMismatch {
        expected: ControlMode,
        actual: ControlMode,
    },
    #[error("joint stopped by the fail-safe; set a control mode to resume")]
    Stopped,
    #[error("setpoint is not a finite number: {0}")]
    NonFinite(f32),
    #[error("unknown joint: {0}")]
    UnknownJoint(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A joint configuration that violates a startup precondition.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("joint '{joint}': {reason}")]
pub struct ConfigError {
    pub joint: String,
    pub reason: String,
}

impl ConfigError {
    pub fn new(joint: &str, reason: impl Into<String>) -> Self {
        Self {
            joint: joint.to_string(),
            reason: reason.into(),
        }
    }
}
