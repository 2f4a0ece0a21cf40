use can_transport::CanId;
use joint_control::JointError;
use thiserror::Error;

pub type Result<T, E = ProtocolError> = core::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("unrecognised identifier {0}")]
    UnknownId(CanId),
    #[error("payload too short for {what}: {len} bytes")]
    ShortPayload { what: &'static str, len: usize },
    #[error("joint index {0} out of range")]
    UnknownJoint(usize),
    #[error("invalid identifier layout: {0}")]
    Layout(String),
    #[error(transparent)]
    Joint(#[from] JointError),
}
