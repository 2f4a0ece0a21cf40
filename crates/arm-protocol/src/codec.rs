use crate::ids::{CommandKind, ProtocolIds};
use crate::{ProtocolError, Result};
use can_transport::{CanFrame, Timestamp};
use joint_control::{ControlMode, Health};
use serde::{Deserialize, Serialize};

/// Inbound command addressed to one joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmCommand {
    SetControlMode { joint: usize, mode: ControlMode },
    /// Meaning of `value` depends on the joint's mode when it is dispatched.
    SetMotion { joint: usize, value: f32 },
}

impl ArmCommand {
    pub fn joint(&self) -> usize {
        match *self {
            ArmCommand::SetControlMode { joint, .. } | ArmCommand::SetMotion { joint, .. } => {
                joint
            }
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            ArmCommand::SetControlMode { .. } => CommandKind::SetControlMode,
            ArmCommand::SetMotion { .. } => CommandKind::SetMotion,
        }
    }
}

/// Periodic angle report for one joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub joint: usize,
    pub angle_deg: f32,
    pub health: Health,
}

const TELEMETRY_LEN: usize = 5;

pub fn encode_command(ids: &ProtocolIds, cmd: &ArmCommand) -> Result<CanFrame> {
    let id = ids.command_id(cmd.joint(), cmd.kind())?;
    let frame = match *cmd {
        ArmCommand::SetControlMode { mode, .. } => CanFrame::new(id, &[mode.as_u8()]),
        ArmCommand::SetMotion { value, .. } => CanFrame::new(id, &value.to_le_bytes()),
    };
    frame.ok_or_else(|| ProtocolError::Layout("payload longer than 8 bytes".to_string()))
}

pub fn decode_command(ids: &ProtocolIds, frame: &CanFrame) -> Result<ArmCommand> {
    let (joint, kind) = ids
        .classify(frame.id)
        .ok_or(ProtocolError::UnknownId(frame.id))?;
    let data = frame.payload();
    match kind {
        CommandKind::SetControlMode => {
            let raw = *data.first().ok_or(ProtocolError::ShortPayload {
                what: "control mode",
                len: data.len(),
            })?;
            let mode = ControlMode::try_from(raw)?;
            Ok(ArmCommand::SetControlMode { joint, mode })
        }
        CommandKind::SetMotion => {
            let value = read_f32_le(data, "motion")?;
            Ok(ArmCommand::SetMotion { joint, value })
        }
    }
}

pub fn encode_telemetry(ids: &ProtocolIds, telemetry: &Telemetry) -> Result<CanFrame> {
    let id = ids.telemetry_id(telemetry.joint)?;
    let mut buf = [0u8; TELEMETRY_LEN];
    buf[0..4].copy_from_slice(&telemetry.angle_deg.to_le_bytes());
    buf[4] = telemetry.health.as_u8();
    CanFrame::new(id, &buf)
        .ok_or_else(|| ProtocolError::Layout("payload longer than 8 bytes".to_string()))
}

/// Decode a telemetry frame. A 4-byte payload (angle only) reports `Health::Ok`.
pub fn decode_telemetry(ids: &ProtocolIds, frame: &CanFrame) -> Result<Telemetry> {
    let joint = ids
        .telemetry_joint(frame.id)
        .ok_or(ProtocolError::UnknownId(frame.id))?;
    let data = frame.payload();
    let angle_deg = read_f32_le(data, "telemetry angle")?;
    let health = data.get(4).copied().map(Health::from_u8).unwrap_or(Health::Ok);
    Ok(Telemetry {
        joint,
        angle_deg,
        health,
    })
}

fn read_f32_le(data: &[u8], what: &'static str) -> Result<f32> {
    let bytes: [u8; 4] = data
        .get(0..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(ProtocolError::ShortPayload {
            what,
            len: data.len(),
        })?;
    Ok(f32::from_le_bytes(bytes))
}

/// Telemetry in a form suitable for logs and JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub id: String,
    pub joint: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub angle_deg: f32,
    pub health: Health,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl TelemetryRecord {
    pub fn from_frame(
        ids: &ProtocolIds,
        frame: &CanFrame,
        name: Option<&str>,
    ) -> Result<TelemetryRecord> {
        let t = decode_telemetry(ids, frame)?;
        Ok(TelemetryRecord {
            id: frame.id.to_string(),
            joint: t.joint,
            name: name.map(str::to_string),
            angle_deg: t.angle_deg,
            health: t.health,
            ts: frame.timestamp.and_then(|Timestamp(t)| {
                t.format(&time::format_description::well_known::Rfc3339).ok()
            }),
        })
    }
}
