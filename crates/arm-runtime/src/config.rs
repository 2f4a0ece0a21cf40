use crate::{NodeConfigError, Result};
use anyhow::Context;
use arm_protocol::ProtocolIds;
use joint_control::{EncoderConfig, JointConfig, MotorConfig, PidGains};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Bus wiring and identifier layout of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanConfig {
    #[serde(default = "default_device")]
    pub device: String,
    pub command_base_id: u16,
    pub telemetry_base_id: u16,
    /// Acceptance mask applied with `command_base_id`; must pass the whole command block.
    #[serde(default = "default_filter_mask")]
    pub filter_mask: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub can: CanConfig,
    /// Control tick, normally equal to the PID sampling interval.
    #[serde(default = "default_update_period_ms")]
    pub update_period_ms: u64,
    #[serde(default = "default_telemetry_period_ms")]
    pub telemetry_period_ms: u64,
    /// Silence after which every joint is stopped.
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,
    /// Pin toggled on every received command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_led_pin: Option<String>,
    pub joints: Vec<JointConfig>,
}

/// Allowed difference between a PID interval and the update period.
const PID_INTERVAL_TOLERANCE_S: f32 = 0.0005;

fn default_device() -> String {
    "can0".to_string()
}
fn default_filter_mask() -> u32 {
    0x7F0
}
fn default_update_period_ms() -> u64 {
    50
}
fn default_telemetry_period_ms() -> u64 {
    100
}
fn default_watchdog_timeout_ms() -> u64 {
    500
}

impl NodeConfig {
    /// Everything `ArmNode::new` relies on, checked up front.
    pub fn validate(&self) -> Result<()> {
        if self.joints.is_empty() {
            return Err(NodeConfigError::NoJoints);
        }
        let mut seen = HashSet::new();
        for joint in &self.joints {
            joint.validate()?;
            if !seen.insert(joint.name.as_str()) {
                return Err(NodeConfigError::DuplicateJoint(joint.name.clone()));
            }
        }
        for (field, v) in [
            ("update_period_ms", self.update_period_ms),
            ("telemetry_period_ms", self.telemetry_period_ms),
            ("watchdog_timeout_ms", self.watchdog_timeout_ms),
        ] {
            if v == 0 {
                return Err(NodeConfigError::Period { field });
            }
        }
        let period_s = self.update_period().as_secs_f32();
        for joint in &self.joints {
            for (pid, gains) in [
                ("velocity_pid", &joint.velocity_pid),
                ("position_pid", &joint.position_pid),
            ] {
                if (gains.interval_s - period_s).abs() > PID_INTERVAL_TOLERANCE_S {
                    return Err(NodeConfigError::PidInterval {
                        joint: joint.name.clone(),
                        pid,
                        interval_s: gains.interval_s,
                        period_ms: self.update_period_ms,
                    });
                }
            }
        }
        let ids = self.protocol_ids()?;
        ids.filter(self.can.filter_mask)?;
        Ok(())
    }

    pub fn protocol_ids(&self) -> Result<ProtocolIds> {
        Ok(ProtocolIds::new(
            self.can.command_base_id,
            self.can.telemetry_base_id,
            self.joints.len(),
        )?)
    }

    pub fn update_period(&self) -> Duration {
        Duration::from_millis(self.update_period_ms)
    }

    pub fn telemetry_period(&self) -> Duration {
        Duration::from_millis(self.telemetry_period_ms)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    /// The lower arm node as deployed: turntable, shoulder and elbow.
    pub fn arm_lower_default() -> Self {
        let pid = |p: f32, i: f32| PidGains {
            p,
            i,
            d: 0.0,
            bias: 0.0,
            interval_s: 0.05,
        };
        let joint = |name: &str,
                     n: u8,
                     motor_inverted: bool,
                     zero: f32,
                     range: (f32, f32),
                     encoder_inverted: bool,
                     limits: (&str, &str),
                     velocity: PidGains,
                     position: PidGains| JointConfig {
            name: name.to_string(),
            motor: MotorConfig {
                pwm_pin: format!("MOTOR{n}"),
                dir_pin: format!("MOTOR{n}_DIR"),
                inverted: motor_inverted,
                freq_hz: 20_000.0,
                limit: 1.0,
            },
            encoder: EncoderConfig {
                pwm_pin: format!("ENC_A{n}"),
                zero_angle_duty_cycle: zero,
                min_angle_deg: range.0,
                max_angle_deg: range.1,
                inverted: encoder_inverted,
                degrees_per_duty_cycle: 360.0,
                fault_margin_deg: 5.0,
            },
            lim_switch_min_pin: limits.0.to_string(),
            lim_switch_max_pin: limits.1.to_string(),
            velocity_pid: velocity,
            position_pid: position,
            min_input_velocity_dps: -20.0,
            max_input_velocity_dps: 20.0,
            min_output_duty_cycle: -1.0,
            max_output_duty_cycle: 1.0,
        };

        NodeConfig {
            name: "arm_lower".to_string(),
            can: CanConfig {
                device: default_device(),
                command_base_id: 0x300,
                telemetry_base_id: 0x780,
                filter_mask: default_filter_mask(),
            },
            update_period_ms: default_update_period_ms(),
            telemetry_period_ms: default_telemetry_period_ms(),
            watchdog_timeout_ms: default_watchdog_timeout_ms(),
            activity_led_pin: Some("LED4".to_string()),
            joints: vec![
                joint(
                    "turntable",
                    1,
                    true,
                    0.502,
                    (-100.0, 100.0),
                    true,
                    ("LIM_1A", "LIM_1B"),
                    pid(1.0, 0.0),
                    pid(4.5, 0.98),
                ),
                joint(
                    "shoulder",
                    2,
                    false,
                    0.752,
                    (-1.0, 140.0),
                    true,
                    ("LIM_2B", "LIM_2A"),
                    pid(0.65, 0.20),
                    pid(6.1, 0.0),
                ),
                joint(
                    "elbow",
                    3,
                    true,
                    0.755,
                    (-160.0, 1.0),
                    false,
                    ("LIM_3B", "LIM_3A"),
                    pid(0.7, 0.05),
                    pid(16.0, 0.97),
                ),
            ],
        }
    }
}

/// Load and validate a node configuration from YAML.
pub fn load_node_config(path: impl AsRef<Path>) -> anyhow::Result<NodeConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading node config: {}", path.display()))?;
    let config: NodeConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing yaml: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating node config: {}", path.display()))?;
    Ok(config)
}
