//! arm-protocol: the lower arm node's CAN wire format
//!
//! Each joint owns two command identifiers (set control mode, set motion) in a
//! contiguous block and one telemetry identifier. Motion values and angles
//! travel as little-endian `f32`; the meaning of a motion value is decided by
//! the joint's control mode at the time it is dispatched.

mod error;
pub use error::{ProtocolError, Result};

mod ids;
pub use ids::{CommandKind, ProtocolIds};

mod codec;
pub use codec::{
    decode_command, decode_telemetry, encode_command, encode_telemetry, ArmCommand, Telemetry,
    TelemetryRecord,
};

mod dispatch;
pub use dispatch::{dispatch, handle_frame, Dispatched};
