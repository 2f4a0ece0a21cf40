use crate::codec::{decode_command, ArmCommand};
use crate::ids::ProtocolIds;
use crate::{ProtocolError, Result};
use can_transport::CanFrame;
use joint_control::{ControlMode, JointRegistry, MotionSetpoint};
use tracing::{debug, info};

/// What a successfully dispatched command changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatched {
    Mode { joint: usize, mode: ControlMode },
    /// `applied` is the setpoint after clamping.
    Motion {
        joint: usize,
        motion: MotionSetpoint,
        applied: f32,
    },
}

/// Apply a decoded command to its joint. Errors leave the joint untouched.
pub fn dispatch(registry: &mut JointRegistry, command: ArmCommand) -> Result<Dispatched> {
    let joint_index = command.joint();
    let joint = registry
        .get_mut(joint_index)
        .ok_or(ProtocolError::UnknownJoint(joint_index))?;
    match command {
        ArmCommand::SetControlMode { joint: index, mode } => {
            joint.set_control_mode(mode);
            Ok(Dispatched::Mode { joint: index, mode })
        }
        ArmCommand::SetMotion {
            joint: index,
            value,
        } => {
            let motion = MotionSetpoint::for_mode(joint.control_mode(), value);
            let applied = joint.apply_motion(motion)?;
            debug!(joint = %joint.name(), ?motion, applied, "motion setpoint applied");
            Ok(Dispatched::Motion {
                joint: index,
                motion,
                applied,
            })
        }
    }
}

/// Decode a received frame and dispatch it.
pub fn handle_frame(
    ids: &ProtocolIds,
    registry: &mut JointRegistry,
    frame: &CanFrame,
) -> Result<Dispatched> {
    let command = decode_command(ids, frame)?;
    let outcome = dispatch(registry, command)?;
    if let Dispatched::Mode { joint, mode } = outcome {
        info!(joint, %mode, id = %frame.id, "control mode command");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_command;
    use can_transport::CanId;
    use joint_control::sim::SimJoint;
    use joint_control::{JointConfig, JointController, JointError};

    fn joint_config(name: &str) -> JointConfig {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "motor": {"pwm_pin": "M", "dir_pin": "D", "freq_hz": 20000.0},
            "encoder": {"pwm_pin": "E", "zero_angle_duty_cycle": 0.5,
                        "min_angle_deg": -90.0, "max_angle_deg": 90.0},
            "lim_switch_min_pin": "LA", "lim_switch_max_pin": "LB",
            "velocity_pid": {"p": 0.01, "i": 0.0, "d": 0.0, "interval_s": 0.05},
            "position_pid": {"p": 0.05, "i": 0.0, "d": 0.0, "interval_s": 0.05},
            "min_input_velocity_dps": -20.0, "max_input_velocity_dps": 20.0
        }))
        .unwrap()
    }

    fn setup() -> (ProtocolIds, JointRegistry, Vec<SimJoint>) {
        let mut registry = JointRegistry::default();
        let mut sims = Vec::new();
        for name in ["turntable", "shoulder", "elbow"] {
            let cfg = joint_config(name);
            let sim = SimJoint::new(&cfg, 60.0);
            registry.push(JointController::new(cfg, sim.pins()).unwrap());
            sims.push(sim);
        }
        (ProtocolIds::new(0x300, 0x780, 3).unwrap(), registry, sims)
    }

    #[test]
    fn test_motion_follows_current_mode() {
        let (ids, mut reg, _sims) = setup();
        let motion = |value| ArmCommand::SetMotion { joint: 1, value };

        let out = dispatch(&mut reg, motion(0.4)).unwrap();
        assert!(matches!(
            out,
            Dispatched::Motion {
                motion: MotionSetpoint::DutyCycle(_),
                ..
            }
        ));

        let mode = encode_command(
            &ids,
            &ArmCommand::SetControlMode {
                joint: 1,
                mode: ControlMode::VelocityPid,
            },
        )
        .unwrap();
        handle_frame(&ids, &mut reg, &mode).unwrap();
        let out = dispatch(&mut reg, motion(35.0)).unwrap();
        assert_eq!(
            out,
            Dispatched::Motion {
                joint: 1,
                motion: MotionSetpoint::VelocityDegPerSec(35.0),
                applied: 20.0,
            }
        );
        assert_eq!(reg.get(1).unwrap().setpoint(), 20.0);
        assert_eq!(reg.get(0).unwrap().setpoint(), 0.0);
    }

    #[test]
    fn test_unknown_mode_frame_leaves_joint_alone() {
        let (ids, mut reg, _sims) = setup();
        reg.get_mut(2)
            .unwrap()
            .set_control_mode(ControlMode::PositionPid);
        let frame = CanFrame::new(CanId::standard(0x304).unwrap(), &[9]).unwrap();
        let err = handle_frame(&ids, &mut reg, &frame).unwrap_err();
        assert_eq!(err, ProtocolError::Joint(JointError::UnknownControlMode(9)));
        assert_eq!(reg.get(2).unwrap().control_mode(), ControlMode::PositionPid);
    }

    #[test]
    fn test_non_finite_motion_rejected() {
        let (ids, mut reg, _sims) = setup();
        let frame = encode_command(
            &ids,
            &ArmCommand::SetMotion {
                joint: 0,
                value: f32::NAN,
            },
        )
        .unwrap();
        let before = reg.get(0).unwrap().setpoint();
        assert!(matches!(
            handle_frame(&ids, &mut reg, &frame),
            Err(ProtocolError::Joint(JointError::NonFinite(_)))
        ));
        assert_eq!(reg.get(0).unwrap().setpoint(), before);
    }

    #[test]
    fn test_joint_outside_registry() {
        let (_ids, mut reg, _sims) = setup();
        let err = dispatch(
            &mut reg,
            ArmCommand::SetControlMode {
                joint: 5,
                mode: ControlMode::DutyCycle,
            },
        )
        .unwrap_err();
        assert_eq!(err, ProtocolError::UnknownJoint(5));
    }

    #[test]
    fn test_position_command_clamped_to_range() {
        let (_ids, mut reg, _sims) = setup();
        dispatch(
            &mut reg,
            ArmCommand::SetControlMode {
                joint: 0,
                mode: ControlMode::PositionPid,
            },
        )
        .unwrap();
        let out = dispatch(
            &mut reg,
            ArmCommand::SetMotion {
                joint: 0,
                value: 250.0,
            },
        )
        .unwrap();
        assert!(matches!(out, Dispatched::Motion { applied, .. } if applied == 90.0));
    }
}
