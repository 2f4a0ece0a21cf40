use crate::hal::PwmInput;
use crate::{EncoderConfig, Health};

/// One sample of the angle sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleReading {
    /// Calibrated angle, always within the configured range. An invalid raw
    /// duty cycle repeats the last valid angle.
    pub degrees: f32,
    pub raw_duty_cycle: f32,
    pub health: Health,
}

/// Absolute angle sensor that encodes the angle as a PWM duty cycle.
pub struct AngleSensor {
    input: Box<dyn PwmInput>,
    zero_duty: f32,
    scale: f32,
    min_deg: f32,
    max_deg: f32,
    fault_margin_deg: f32,
    last_valid_deg: Option<f32>,
}

impl AngleSensor {
    pub fn new(config: &EncoderConfig, input: Box<dyn PwmInput>) -> Self {
        let sign = if config.inverted { -1.0 } else { 1.0 };
        Self {
            input,
            zero_duty: config.zero_angle_duty_cycle,
            scale: sign * config.degrees_per_duty_cycle,
            min_deg: config.min_angle_deg,
            max_deg: config.max_angle_deg,
            fault_margin_deg: config.fault_margin_deg,
            last_valid_deg: None,
        }
    }

    pub fn read(&mut self) -> AngleReading {
        let raw = self.input.duty_cycle();
        if !raw.is_finite() || !(0.0..=1.0).contains(&raw) {
            // Before any valid sample, park at the nearest edge of the range.
            let degrees = match self.last_valid_deg {
                Some(deg) => deg,
                None if raw.is_finite() => self.to_degrees(raw).clamp(self.min_deg, self.max_deg),
                None => self.min_deg,
            };
            return AngleReading {
                degrees,
                raw_duty_cycle: raw,
                health: Health::Fault,
            };
        }

        let unclamped = self.to_degrees(raw);
        let degrees = unclamped.clamp(self.min_deg, self.max_deg);
        self.last_valid_deg = Some(degrees);
        let overshoot = (unclamped - degrees).abs();
        let health = if overshoot == 0.0 {
            Health::Ok
        } else if overshoot <= self.fault_margin_deg {
            Health::Degraded
        } else {
            Health::Fault
        };
        AngleReading {
            degrees,
            raw_duty_cycle: raw,
            health,
        }
    }

    pub fn read_angle_degrees(&mut self) -> f32 {
        self.read().degrees
    }

    pub fn min_angle_deg(&self) -> f32 {
        self.min_deg
    }

    pub fn max_angle_deg(&self) -> f32 {
        self.max_deg
    }

    fn to_degrees(&self, duty: f32) -> f32 {
        (duty - self.zero_duty) * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FixedInput(Arc<Mutex<f32>>);

    impl PwmInput for FixedInput {
        fn duty_cycle(&mut self) -> f32 {
            *self.0.lock().unwrap()
        }
    }

    fn sensor(inverted: bool) -> (AngleSensor, Arc<Mutex<f32>>) {
        let duty = Arc::new(Mutex::new(0.5));
        let cfg = EncoderConfig {
            pwm_pin: "ENC".into(),
            zero_angle_duty_cycle: 0.5,
            min_angle_deg: -90.0,
            max_angle_deg: 90.0,
            inverted,
            degrees_per_duty_cycle: 360.0,
            fault_margin_deg: 5.0,
        };
        (
            AngleSensor::new(&cfg, Box::new(FixedInput(Arc::clone(&duty)))),
            duty,
        )
    }

    #[test]
    fn test_zero_duty_reads_zero() {
        let (mut s, _duty) = sensor(false);
        let r = s.read();
        assert_eq!(r.degrees, 0.0);
        assert_eq!(r.health, Health::Ok);
    }

    #[test]
    fn test_scale_and_inversion() {
        let (mut s, duty) = sensor(false);
        *duty.lock().unwrap() = 0.625;
        assert!((s.read_angle_degrees() - 45.0).abs() < 1e-3);

        let (mut s, duty) = sensor(true);
        *duty.lock().unwrap() = 0.625;
        assert!((s.read_angle_degrees() + 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_output_clamped_and_monotonic() {
        for inverted in [false, true] {
            let (mut s, duty) = sensor(inverted);
            let mut prev: Option<f32> = None;
            for step in 0..=100 {
                *duty.lock().unwrap() = step as f32 / 100.0;
                let deg = s.read_angle_degrees();
                assert!((-90.0..=90.0).contains(&deg));
                if let Some(p) = prev {
                    if inverted {
                        assert!(deg <= p);
                    } else {
                        assert!(deg >= p);
                    }
                }
                prev = Some(deg);
            }
        }
    }

    #[test]
    fn test_small_overshoot_is_degraded() {
        let (mut s, duty) = sensor(false);
        // 92 degrees: 2 past the edge, inside the 5 degree margin.
        *duty.lock().unwrap() = 0.5 + 92.0 / 360.0;
        let r = s.read();
        assert_eq!(r.degrees, 90.0);
        assert_eq!(r.health, Health::Degraded);
    }

    #[test]
    fn test_large_overshoot_and_invalid_duty_fault() {
        let (mut s, duty) = sensor(false);
        *duty.lock().unwrap() = 0.95;
        let r = s.read();
        assert_eq!(r.degrees, 90.0);
        assert_eq!(r.health, Health::Fault);

        *duty.lock().unwrap() = 1.5;
        assert_eq!(s.read().health, Health::Fault);

        *duty.lock().unwrap() = f32::NAN;
        let r = s.read();
        assert_eq!(r.health, Health::Fault);
        assert_eq!(r.degrees, 90.0);
    }

    #[test]
    fn test_invalid_duty_repeats_last_valid_angle() {
        let (mut s, duty) = sensor(false);
        *duty.lock().unwrap() = f32::NAN;
        assert_eq!(s.read().degrees, -90.0);

        *duty.lock().unwrap() = 0.625;
        assert!((s.read_angle_degrees() - 45.0).abs() < 1e-3);

        for raw in [f32::NAN, f32::INFINITY, -0.2, 1.5] {
            *duty.lock().unwrap() = raw;
            let r = s.read();
            assert_eq!(r.health, Health::Fault);
            assert!((r.degrees - 45.0).abs() < 1e-3, "raw {raw} read {}", r.degrees);
        }
    }
}
