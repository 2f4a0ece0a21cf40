//! arm-runtime: the lower arm node's control loop and its surroundings
//!
//! Loads and validates the node configuration, exposes Prometheus counters and
//! runs [`ArmNode`], the fixed-period loop that polls the bus, dispatches
//! commands, enforces the communication watchdog, publishes telemetry and
//! updates every joint.

mod error;
pub use error::{NodeConfigError, Result};

mod config;
pub use config::{load_node_config, CanConfig, NodeConfig};

mod clock;
pub use clock::{Clock, ManualClock, MonotonicClock};

mod metrics;
pub use metrics::NodeMetrics;

mod node;
pub use node::{ArmNode, FrameOutcome, RunSummary, StepReport};

#[cfg(feature = "sim")]
mod sim;
#[cfg(feature = "sim")]
pub use sim::SimNode;
