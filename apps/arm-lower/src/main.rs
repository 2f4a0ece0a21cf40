use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser, Subcommand, ValueEnum};
use std::sync::atomic::AtomicBool;
use tracing::info;

use arm_protocol::{self as proto, ArmCommand, ProtocolIds, TelemetryRecord};
use arm_runtime::{load_node_config, Clock, ManualClock, MonotonicClock, NodeConfig, SimNode};
use can_transport as can;
use joint_control::ControlMode;

#[derive(Parser, Debug)]
#[command(
    name = "arm-lower",
    version,
    about = "Lower arm joint node",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the node against simulated joints on the mock bus
    Run {
        /// Node config YAML (defaults to the built-in lower arm layout)
        #[arg(long)]
        config: Option<String>,
        /// Number of control ticks to run
        #[arg(long, default_value_t = 40u64)]
        ticks: u64,
        /// Pace ticks with the wall clock instead of simulated time
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
        /// Command to inject, as <joint>:<mode|motion>:<value>; repeatable.
        /// All commands are queued before the first tick and nothing follows,
        /// so the watchdog stops every joint once its timeout passes after the
        /// last one; raise it with --watchdog-ms for longer runs
        #[arg(long = "cmd")]
        cmds: Vec<String>,
        /// Override the config's communication watchdog timeout
        #[arg(long)]
        watchdog_ms: Option<u64>,
        /// Top speed of the simulated joints in deg/s
        #[arg(long, default_value_t = 60.0)]
        sim_speed: f32,
        /// Print Prometheus metrics when done
        #[arg(long, action = ArgAction::SetTrue)]
        metrics: bool,
    },
    /// Build a command frame and print it
    #[command(group(ArgGroup::new("what").required(true).args(["mode", "motion"])))]
    Encode {
        #[arg(long)]
        config: Option<String>,
        /// Joint name
        #[arg(long)]
        joint: String,
        /// Set control mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Set motion (duty cycle, deg/s or deg depending on the joint's mode)
        #[arg(long, allow_hyphen_values = true)]
        motion: Option<f32>,
    },
    /// Decode a frame seen on the bus and print it as JSON
    Decode {
        #[arg(long)]
        config: Option<String>,
        /// CAN id (hex), e.g. 0x781
        #[arg(long)]
        id: String,
        /// Data bytes as hex (space separated), e.g. 00 00 34 42 00
        #[arg(long, num_args = 0..)]
        data: Vec<String>,
    },
    /// Validate a node config
    ConfigCheck {
        #[arg(long)]
        config: String,
        /// Print the parsed config as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Print the built-in lower arm config as YAML
    DefaultConfig,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ModeArg {
    Duty,
    Velocity,
    Position,
}

impl From<ModeArg> for ControlMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Duty => ControlMode::DutyCycle,
            ModeArg::Velocity => ControlMode::VelocityPid,
            ModeArg::Position => ControlMode::PositionPid,
        }
    }
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            ticks,
            realtime,
            cmds,
            watchdog_ms,
            sim_speed,
            metrics,
        } => {
            let mut cfg = node_config(config.as_deref())?;
            override_watchdog(&mut cfg, watchdog_ms)?;
            if realtime {
                run_sim(&cfg, MonotonicClock::new(), ticks, &cmds, sim_speed, metrics)
            } else {
                run_sim(&cfg, ManualClock::new(), ticks, &cmds, sim_speed, metrics)
            }
        }
        Commands::Encode {
            config,
            joint,
            mode,
            motion,
        } => encode(config.as_deref(), &joint, mode, motion),
        Commands::Decode { config, id, data } => decode(config.as_deref(), &id, &data),
        Commands::ConfigCheck { config, json } => config_check(&config, json),
        Commands::DefaultConfig => {
            print!("{}", serde_yaml::to_string(&NodeConfig::arm_lower_default())?);
            Ok(())
        }
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn node_config(path: Option<&str>) -> Result<NodeConfig> {
    match path {
        Some(p) => load_node_config(p),
        None => Ok(NodeConfig::arm_lower_default()),
    }
}

fn override_watchdog(cfg: &mut NodeConfig, watchdog_ms: Option<u64>) -> Result<()> {
    if let Some(ms) = watchdog_ms {
        cfg.watchdog_timeout_ms = ms;
        cfg.validate().context("invalid --watchdog-ms")?;
    }
    Ok(())
}

fn joint_index(cfg: &NodeConfig, name: &str) -> Result<usize> {
    cfg.joints
        .iter()
        .position(|j| j.name == name)
        .ok_or_else(|| anyhow::anyhow!("unknown joint '{name}'"))
}

/// Parse `<joint>:<mode|motion>:<value>`.
fn parse_cmd(cfg: &NodeConfig, spec: &str) -> Result<ArmCommand> {
    let mut parts = spec.splitn(3, ':');
    let (Some(joint), Some(kind), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        anyhow::bail!("expected <joint>:<mode|motion>:<value>, got '{spec}'");
    };
    let joint = joint_index(cfg, joint)?;
    match kind {
        "mode" => {
            let mode = match value {
                "duty" | "0" => ControlMode::DutyCycle,
                "velocity" | "1" => ControlMode::VelocityPid,
                "position" | "2" => ControlMode::PositionPid,
                other => anyhow::bail!("unknown mode '{other}'"),
            };
            Ok(ArmCommand::SetControlMode { joint, mode })
        }
        "motion" => {
            let value: f32 = value
                .parse()
                .with_context(|| format!("invalid motion value '{value}'"))?;
            Ok(ArmCommand::SetMotion { joint, value })
        }
        other => anyhow::bail!("unknown command kind '{other}'"),
    }
}

fn queue_cmds<C: Clock>(
    sim: &SimNode<C>,
    cfg: &NodeConfig,
    ids: &ProtocolIds,
    cmds: &[String],
) -> Result<()> {
    for spec in cmds {
        let cmd = parse_cmd(cfg, spec)?;
        let frame = proto::encode_command(ids, &cmd)?;
        info!(%frame, "queued command");
        sim.bus.inject(frame)?;
    }
    Ok(())
}

fn run_sim<C: Clock>(
    cfg: &NodeConfig,
    clock: C,
    ticks: u64,
    cmds: &[String],
    sim_speed: f32,
    metrics: bool,
) -> Result<()> {
    let ids = cfg.protocol_ids()?;
    let mut sim = SimNode::build(cfg, clock, sim_speed)?;
    queue_cmds(&sim, cfg, &ids, cmds)?;

    let bus = sim.bus.clone();
    let names: Vec<String> = cfg.joints.iter().map(|j| j.name.clone()).collect();
    let stop = AtomicBool::new(false);
    let summary = sim.run_with(Some(ticks), &stop, |report| {
        if report.telemetry_sent == 0 {
            return;
        }
        let sent = match bus.take_sent() {
            Ok(sent) => sent,
            Err(e) => {
                tracing::warn!(error = %e, "reading mock bus");
                return;
            }
        };
        for frame in sent {
            let name = ids
                .telemetry_joint(frame.id)
                .and_then(|j| names.get(j))
                .map(String::as_str);
            if let Ok(rec) = TelemetryRecord::from_frame(&ids, &frame, name) {
                println!("{}", serde_json::to_string(&rec).unwrap_or_default());
            }
        }
    });

    println!(
        "run: ticks={} telemetry_frames={} failsafe_trips={} overruns={}",
        summary.ticks, summary.telemetry_frames, summary.failsafe_trips, summary.overruns
    );
    for (joint, plant) in sim.node.registry().iter().zip(&sim.joints) {
        println!(
            "{}\tmode={}\tsetpoint={:.3}\tangle={:.2}\tduty={:.3}\thealth={:?}",
            joint.name(),
            joint.control_mode(),
            joint.setpoint(),
            plant.angle_deg(),
            joint.duty_cycle(),
            joint.health()
        );
    }
    if metrics {
        print!("{}", sim.node.metrics().encode_text());
    }
    Ok(())
}

fn encode(
    config: Option<&str>,
    joint: &str,
    mode: Option<ModeArg>,
    motion: Option<f32>,
) -> Result<()> {
    let cfg = node_config(config)?;
    let ids = cfg.protocol_ids()?;
    let joint = joint_index(&cfg, joint)?;
    let cmd = match (mode, motion) {
        (Some(m), None) => ArmCommand::SetControlMode {
            joint,
            mode: m.into(),
        },
        (None, Some(value)) => ArmCommand::SetMotion { joint, value },
        _ => anyhow::bail!("provide exactly one of --mode or --motion"),
    };
    let frame = proto::encode_command(&ids, &cmd)?;
    println!("{frame}");
    Ok(())
}

fn decode(config: Option<&str>, id_str: &str, data_hex: &[String]) -> Result<()> {
    let cfg = node_config(config)?;
    let ids = cfg.protocol_ids()?;
    let id = parse_id(id_str).ok_or_else(|| anyhow::anyhow!("invalid CAN id: {id_str}"))?;
    let bytes = parse_hex_bytes(data_hex)?;
    let frame =
        can::CanFrame::new(id, &bytes).ok_or_else(|| anyhow::anyhow!("invalid frame length"))?;
    let value = describe_frame(&cfg, &ids, &frame)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn describe_frame(
    cfg: &NodeConfig,
    ids: &ProtocolIds,
    frame: &can::CanFrame,
) -> Result<serde_json::Value> {
    let joint_name = |j: usize| cfg.joints.get(j).map(|c| c.name.as_str()).unwrap_or("?");
    if let Some(j) = ids.telemetry_joint(frame.id) {
        let rec = TelemetryRecord::from_frame(ids, frame, Some(joint_name(j)))?;
        return Ok(serde_json::to_value(rec)?);
    }
    let value = match proto::decode_command(ids, frame)? {
        ArmCommand::SetControlMode { joint, mode } => serde_json::json!({
            "id": frame.id.to_string(),
            "joint": joint,
            "name": joint_name(joint),
            "command": "set_control_mode",
            "mode": mode,
        }),
        ArmCommand::SetMotion { joint, value } => serde_json::json!({
            "id": frame.id.to_string(),
            "joint": joint,
            "name": joint_name(joint),
            "command": "set_motion",
            "value": value,
        }),
    };
    Ok(value)
}

fn config_check(path: &str, json: bool) -> Result<()> {
    let cfg = load_node_config(path)?;
    let ids = cfg.protocol_ids()?;
    println!(
        "ok: {} ({} joints, commands 0x{:03X}..0x{:03X}, telemetry 0x{:03X}..0x{:03X})",
        cfg.name,
        cfg.joints.len(),
        ids.command_base(),
        usize::from(ids.command_base()) + 2 * ids.joint_count() - 1,
        ids.telemetry_base(),
        usize::from(ids.telemetry_base()) + ids.joint_count() - 1,
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
    }
    Ok(())
}

fn parse_id(s: &str) -> Option<can::CanId> {
    let s_trim = s.trim();
    let no_prefix = s_trim.strip_prefix("0x").unwrap_or(s_trim);
    let parsed = u32::from_str_radix(no_prefix, 16).ok()?;
    if parsed <= 0x7FF {
        can::CanId::standard(parsed as u16)
    } else if parsed <= 0x1FFF_FFFF {
        can::CanId::extended(parsed)
    } else {
        None
    }
}

fn parse_hex_bytes(items: &[String]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(items.len());
    for s in items {
        let t = s.trim();
        let no_prefix = t.strip_prefix("0x").unwrap_or(t);
        let b = u8::from_str_radix(no_prefix, 16)
            .map_err(|e| anyhow::anyhow!("invalid hex byte '{t}': {e}"))?;
        out.push(b);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cmd_forms() {
        let cfg = NodeConfig::arm_lower_default();
        assert_eq!(
            parse_cmd(&cfg, "elbow:mode:position").unwrap(),
            ArmCommand::SetControlMode {
                joint: 2,
                mode: ControlMode::PositionPid
            }
        );
        assert_eq!(
            parse_cmd(&cfg, "shoulder:motion:-12.5").unwrap(),
            ArmCommand::SetMotion {
                joint: 1,
                value: -12.5
            }
        );
        assert!(parse_cmd(&cfg, "wrist:mode:duty").is_err());
        assert!(parse_cmd(&cfg, "elbow:mode:7").is_err());
        assert!(parse_cmd(&cfg, "elbow:motion").is_err());
    }

    #[test]
    fn test_watchdog_override_keeps_queued_commands_alive() -> Result<()> {
        let cmds = ["shoulder:mode:duty".to_string(), "shoulder:motion:0.2".into()];
        let run = |watchdog_ms: Option<u64>| -> Result<(u64, f32)> {
            let mut cfg = NodeConfig::arm_lower_default();
            override_watchdog(&mut cfg, watchdog_ms)?;
            let ids = cfg.protocol_ids()?;
            let mut sim = SimNode::build(&cfg, ManualClock::new(), 60.0)?;
            queue_cmds(&sim, &cfg, &ids, &cmds)?;
            let summary = sim.run_with(Some(40), &AtomicBool::new(false), |_| {});
            Ok((summary.failsafe_trips, sim.joints[1].applied_duty()))
        };

        assert_eq!(run(None)?, (1, 0.0));
        assert_eq!(run(Some(5_000))?, (0, 0.2));
        assert!(run(Some(0)).is_err());
        Ok(())
    }

    #[test]
    fn test_describe_telemetry_frame() {
        let cfg = NodeConfig::arm_lower_default();
        let ids = cfg.protocol_ids().unwrap();
        let id = parse_id("0x781").unwrap();
        let data: Vec<String> = ["00", "00", "34", "42", "01"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let bytes = parse_hex_bytes(&data).unwrap();
        let frame = can::CanFrame::new(id, &bytes).unwrap();
        let v = describe_frame(&cfg, &ids, &frame).unwrap();
        assert_eq!(v["name"], "shoulder");
        assert_eq!(v["angle_deg"], 45.0);
        assert_eq!(v["health"], "degraded");
    }

    #[test]
    fn test_describe_command_frame() {
        let cfg = NodeConfig::arm_lower_default();
        let ids = cfg.protocol_ids().unwrap();
        let frame = can::CanFrame::new(parse_id("300").unwrap(), &[1]).unwrap();
        let v = describe_frame(&cfg, &ids, &frame).unwrap();
        assert_eq!(v["command"], "set_control_mode");
        assert_eq!(v["mode"], "velocity_pid");
        assert_eq!(v["name"], "turntable");
    }
}
