use arm_protocol::ProtocolError;
use joint_control::ConfigError;
use thiserror::Error;

pub type Result<T, E = NodeConfigError> = core::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeConfigError {
    #[error(transparent)]
    Joint(#[from] ConfigError),
    #[error("identifier layout: {0}")]
    Ids(#[from] ProtocolError),
    #[error("{field} must be positive")]
    Period { field: &'static str },
    #[error("joint '{joint}': {pid}.interval_s {interval_s} differs from the {period_ms} ms tick")]
    PidInterval {
        joint: String,
        pid: &'static str,
        interval_s: f32,
        period_ms: u64,
    },
    #[error("duplicate joint name '{0}'")]
    DuplicateJoint(String),
    #[error("node has no joints")]
    NoJoints,
}
