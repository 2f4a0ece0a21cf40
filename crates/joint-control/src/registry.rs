use crate::{JointController, JointError, JointStatus, Result};

/// Every joint this node controls, addressed by index (the order of the wire protocol).
#[derive(Default)]
pub struct JointRegistry {
    joints: Vec<JointController>,
}

impl JointRegistry {
    pub fn new(joints: Vec<JointController>) -> Self {
        Self { joints }
    }

    pub fn push(&mut self, joint: JointController) -> usize {
        self.joints.push(joint);
        self.joints.len() - 1
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&JointController> {
        self.joints.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut JointController> {
        self.joints.get_mut(index)
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.joints
            .iter()
            .position(|j| j.name() == name)
            .ok_or_else(|| JointError::UnknownJoint(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &JointController> {
        self.joints.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut JointController> {
        self.joints.iter_mut()
    }

    /// Tick every joint in index order.
    pub fn update_all(&mut self) -> Vec<JointStatus> {
        self.joints.iter_mut().map(|j| j.update()).collect()
    }

    pub fn stop_all(&mut self) {
        for joint in &mut self.joints {
            joint.stop();
        }
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::config::tests::sample_joint;
    use crate::sim::SimJoint;
    use crate::ControlMode;

    fn registry() -> (JointRegistry, Vec<SimJoint>) {
        let mut reg = JointRegistry::default();
        let mut sims = Vec::new();
        for name in ["turntable", "shoulder", "elbow"] {
            let cfg = sample_joint(name);
            let sim = SimJoint::new(&cfg, 45.0);
            reg.push(JointController::new(cfg, sim.pins()).unwrap());
            sims.push(sim);
        }
        (reg, sims)
    }

    #[test]
    fn test_lookup_by_name() {
        let (reg, _sims) = registry();
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.index_of("elbow").unwrap(), 2);
        assert!(matches!(
            reg.index_of("wrist"),
            Err(JointError::UnknownJoint(_))
        ));
        assert!(reg.get(3).is_none());
    }

    #[test]
    fn test_update_and_stop_all() {
        let (mut reg, sims) = registry();
        for joint in reg.iter_mut() {
            joint.set_motor_duty_cycle(0.5).unwrap();
        }
        let statuses = reg.update_all();
        assert_eq!(statuses.len(), 3);
        assert!(sims.iter().all(|s| s.applied_duty() == 0.5));

        reg.get_mut(1).unwrap().set_control_mode(ControlMode::PositionPid);
        reg.stop_all();
        assert!(reg.iter().all(|j| j.control_mode() == ControlMode::DutyCycle));
        assert!(reg.iter().all(|j| j.is_stopped()));
        assert!(sims.iter().all(|s| s.applied_duty() == 0.0));
    }
}
