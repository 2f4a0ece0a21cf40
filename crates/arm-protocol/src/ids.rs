use crate::{ProtocolError, Result};
use can_transport::{CanFilter, CanId, MAX_STANDARD_ID};
use serde::{Deserialize, Serialize};

/// The two commands every joint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    SetControlMode,
    SetMotion,
}

impl CommandKind {
    fn offset(self) -> u16 {
        match self {
            CommandKind::SetControlMode => 0,
            CommandKind::SetMotion => 1,
        }
    }
}

/// Identifier layout of one node.
///
/// Commands occupy a contiguous block starting at `command_base`: joint `j`
/// owns `command_base + 2j` (set control mode) and `command_base + 2j + 1`
/// (set motion). Telemetry for joint `j` goes out on `telemetry_base + j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIds")]
pub struct ProtocolIds {
    command_base: u16,
    telemetry_base: u16,
    joint_count: usize,
}

#[derive(Deserialize)]
struct RawIds {
    command_base: u16,
    telemetry_base: u16,
    joint_count: usize,
}

impl TryFrom<RawIds> for ProtocolIds {
    type Error = ProtocolError;

    fn try_from(raw: RawIds) -> Result<Self> {
        ProtocolIds::new(raw.command_base, raw.telemetry_base, raw.joint_count)
    }
}

impl ProtocolIds {
    pub fn new(command_base: u16, telemetry_base: u16, joint_count: usize) -> Result<Self> {
        let block = (joint_count * 2) as u32;
        let cmd_end = u32::from(command_base) + block;
        let tel_end = u32::from(telemetry_base) + joint_count as u32;
        if joint_count == 0 {
            return Err(ProtocolError::Layout("no joints".to_string()));
        }
        if cmd_end > u32::from(MAX_STANDARD_ID) + 1 || tel_end > u32::from(MAX_STANDARD_ID) + 1 {
            return Err(ProtocolError::Layout(format!(
                "ids exceed 11 bits (commands end 0x{cmd_end:X}, telemetry end 0x{tel_end:X})"
            )));
        }
        let overlap =
            u32::from(command_base) < tel_end && u32::from(telemetry_base) < cmd_end;
        if overlap {
            return Err(ProtocolError::Layout(
                "command and telemetry blocks overlap".to_string(),
            ));
        }
        Ok(Self {
            command_base,
            telemetry_base,
            joint_count,
        })
    }

    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    pub fn command_base(&self) -> u16 {
        self.command_base
    }

    pub fn telemetry_base(&self) -> u16 {
        self.telemetry_base
    }

    pub fn command_id(&self, joint: usize, kind: CommandKind) -> Result<CanId> {
        if joint >= self.joint_count {
            return Err(ProtocolError::UnknownJoint(joint));
        }
        let raw = self.command_base + (joint as u16) * 2 + kind.offset();
        CanId::standard(raw).ok_or_else(|| ProtocolError::Layout(format!("id 0x{raw:X}")))
    }

    pub fn telemetry_id(&self, joint: usize) -> Result<CanId> {
        if joint >= self.joint_count {
            return Err(ProtocolError::UnknownJoint(joint));
        }
        let raw = self.telemetry_base + joint as u16;
        CanId::standard(raw).ok_or_else(|| ProtocolError::Layout(format!("id 0x{raw:X}")))
    }

    /// Map an inbound identifier to its joint and command.
    pub fn classify(&self, id: CanId) -> Option<(usize, CommandKind)> {
        if id.is_extended() {
            return None;
        }
        let offset = id.raw().checked_sub(u32::from(self.command_base))? as usize;
        if offset >= self.joint_count * 2 {
            return None;
        }
        let kind = if offset % 2 == 0 {
            CommandKind::SetControlMode
        } else {
            CommandKind::SetMotion
        };
        Some((offset / 2, kind))
    }

    /// Map an identifier to the joint whose telemetry it carries.
    pub fn telemetry_joint(&self, id: CanId) -> Option<usize> {
        if id.is_extended() {
            return None;
        }
        let joint = id.raw().checked_sub(u32::from(self.telemetry_base))? as usize;
        (joint < self.joint_count).then_some(joint)
    }

    /// Acceptance filter for the command block under `mask`.
    pub fn filter(&self, mask: u32) -> Result<CanFilter> {
        let id = CanId::standard(self.command_base)
            .ok_or_else(|| ProtocolError::Layout("command base".to_string()))?;
        let filter = CanFilter { id, mask };
        for joint in 0..self.joint_count {
            for kind in [CommandKind::SetControlMode, CommandKind::SetMotion] {
                let cid = self.command_id(joint, kind)?;
                if !filter.matches(cid) {
                    return Err(ProtocolError::Layout(format!(
                        "filter mask 0x{mask:X} rejects command id {cid}"
                    )));
                }
            }
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> ProtocolIds {
        ProtocolIds::new(0x300, 0x780, 3).unwrap()
    }

    #[test]
    fn test_command_block_layout() {
        let ids = ids();
        let expected = [
            (0x300, 0, CommandKind::SetControlMode),
            (0x301, 0, CommandKind::SetMotion),
            (0x302, 1, CommandKind::SetControlMode),
            (0x303, 1, CommandKind::SetMotion),
            (0x304, 2, CommandKind::SetControlMode),
            (0x305, 2, CommandKind::SetMotion),
        ];
        for (raw, joint, kind) in expected {
            let id = CanId::standard(raw).unwrap();
            assert_eq!(ids.classify(id), Some((joint, kind)));
            assert_eq!(ids.command_id(joint, kind).unwrap(), id);
        }
        assert_eq!(ids.classify(CanId::standard(0x306).unwrap()), None);
        assert_eq!(ids.classify(CanId::standard(0x2FF).unwrap()), None);
        assert_eq!(ids.classify(CanId::extended(0x301).unwrap()), None);
    }

    #[test]
    fn test_telemetry_ids() {
        let ids = ids();
        assert_eq!(ids.telemetry_id(2).unwrap().raw(), 0x782);
        assert_eq!(ids.telemetry_joint(CanId::standard(0x781).unwrap()), Some(1));
        assert_eq!(ids.telemetry_joint(CanId::standard(0x783).unwrap()), None);
        assert_eq!(ids.telemetry_id(3), Err(ProtocolError::UnknownJoint(3)));
    }

    #[test]
    fn test_layout_validation() {
        assert!(ProtocolIds::new(0x7FE, 0x100, 3).is_err());
        assert!(ProtocolIds::new(0x100, 0x103, 3).is_err());
        assert!(ProtocolIds::new(0x100, 0x106, 3).is_ok());
        assert!(ProtocolIds::new(0x100, 0x200, 0).is_err());
    }

    #[test]
    fn test_filter_must_cover_block() {
        let ids = ids();
        let filter = ids.filter(0x7F0).unwrap();
        assert!(filter.matches(CanId::standard(0x305).unwrap()));
        assert!(ids.filter(0x7FF).is_err());
    }

    #[test]
    fn test_deserialize_checks_layout() -> anyhow::Result<()> {
        let back: ProtocolIds = serde_json::from_value(serde_json::to_value(ids())?)?;
        assert_eq!(back, ids());

        let past_11_bits = serde_json::json!({
            "command_base": 0x7FF,
            "telemetry_base": 0x100,
            "joint_count": 3,
        });
        assert!(serde_json::from_value::<ProtocolIds>(past_11_bits).is_err());

        let overlapping = serde_json::json!({
            "command_base": 0x100,
            "telemetry_base": 0x101,
            "joint_count": 3,
        });
        assert!(serde_json::from_value::<ProtocolIds>(overlapping).is_err());
        Ok(())
    }
}
