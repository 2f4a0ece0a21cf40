use crate::hal::DigitalInput;
use crate::Health;

/// The pair of end-of-travel switches bounding a joint.
pub struct LimitSwitches {
    min: Box<dyn DigitalInput>,
    max: Box<dyn DigitalInput>,
}

/// Snapshot of both switches taken once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitState {
    pub at_min: bool,
    pub at_max: bool,
}

impl LimitSwitches {
    pub fn new(min: Box<dyn DigitalInput>, max: Box<dyn DigitalInput>) -> Self {
        Self { min, max }
    }

    pub fn at_minimum(&mut self) -> bool {
        self.min.is_high()
    }

    pub fn at_maximum(&mut self) -> bool {
        self.max.is_high()
    }

    pub fn sample(&mut self) -> LimitState {
        LimitState {
            at_min: self.at_minimum(),
            at_max: self.at_maximum(),
        }
    }
}

impl LimitState {
    /// Zero the part of `output` that would push further into a reached limit.
    /// Positive output moves toward the maximum.
    pub fn clamp(&self, output: f32) -> f32 {
        if (self.at_max && output > 0.0) || (self.at_min && output < 0.0) {
            0.0
        } else {
            output
        }
    }

    /// A joint cannot sit on both ends at once.
    pub fn health(&self) -> Health {
        if self.at_min && self.at_max {
            Health::Fault
        } else {
            Health::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_blocks_only_the_limited_direction() {
        let at_max = LimitState {
            at_min: false,
            at_max: true,
        };
        assert_eq!(at_max.clamp(0.4), 0.0);
        assert_eq!(at_max.clamp(-0.4), -0.4);

        let at_min = LimitState {
            at_min: true,
            at_max: false,
        };
        assert_eq!(at_min.clamp(-0.4), 0.0);
        assert_eq!(at_min.clamp(0.4), 0.4);

        let free = LimitState::default();
        assert_eq!(free.clamp(0.7), 0.7);
        assert_eq!(free.health(), Health::Ok);
    }

    #[test]
    fn test_both_switches_is_fault() {
        let both = LimitState {
            at_min: true,
            at_max: true,
        };
        assert_eq!(both.health(), Health::Fault);
        assert_eq!(both.clamp(1.0), 0.0);
        assert_eq!(both.clamp(-1.0), 0.0);
    }
}
