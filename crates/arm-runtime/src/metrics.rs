use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

#[derive(Clone)]
pub struct NodeMetrics {
    pub registry: Registry,
    pub rx_frames: IntCounter,
    pub tx_frames: IntCounter,
    pub tx_errors: IntCounter,
    pub commands_rejected: IntCounter,
    pub failsafe_trips: IntCounter,
    pub joint_faults: IntCounter,
}

impl NodeMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> prometheus::Result<IntCounter> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };
        Ok(Self {
            rx_frames: counter("arm_can_rx_frames", "Total CAN frames received")?,
            tx_frames: counter("arm_can_tx_frames", "Total CAN frames sent")?,
            tx_errors: counter("arm_can_tx_errors", "CAN sends that failed")?,
            commands_rejected: counter(
                "arm_commands_rejected",
                "Commands rejected by decode or dispatch",
            )?,
            failsafe_trips: counter(
                "arm_failsafe_trips",
                "Times the comms watchdog stopped all joints",
            )?,
            joint_faults: counter(
                "arm_joint_faults",
                "Transitions of a joint into fault health",
            )?,
            registry,
        })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let m = NodeMetrics::new().unwrap();
        m.rx_frames.inc();
        m.failsafe_trips.inc_by(2);
        let text = m.encode_text();
        assert!(text.contains("arm_can_rx_frames 1"));
        assert!(text.contains("arm_failsafe_trips 2"));
        assert!(text.contains("arm_joint_faults 0"));
    }
}
