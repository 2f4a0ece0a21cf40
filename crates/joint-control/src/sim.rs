//! In-memory plant for exercising a joint without hardware.
//!
//! The motor moves the joint at `max_speed_dps` times the applied signed duty
//! cycle. The encoder pin reports the duty cycle the real sensor would produce
//! for the current angle, and the limit switches close at the ends of the
//! calibrated range, which also act as hard stops.

use crate::hal::{DigitalInput, DigitalOutput, JointPins, PwmInput, PwmOutput};
use crate::JointConfig;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct Plant {
    angle_deg: f32,
    pwm_duty: f32,
    pwm_freq_hz: f32,
    dir_high: bool,
    encoder_connected: bool,
    forced_limits: Option<(bool, bool)>,
    zero_duty: f32,
    deg_per_duty: f32,
    motor_inverted: bool,
    min_deg: f32,
    max_deg: f32,
    max_speed_dps: f32,
}

impl Plant {
    fn signed_duty(&self) -> f32 {
        if self.dir_high != self.motor_inverted {
            self.pwm_duty
        } else {
            -self.pwm_duty
        }
    }

    fn limits(&self) -> (bool, bool) {
        self.forced_limits
            .unwrap_or((self.angle_deg <= self.min_deg, self.angle_deg >= self.max_deg))
    }
}

/// A simulated joint; clone freely, all clones share one plant.
#[derive(Clone)]
pub struct SimJoint {
    plant: Arc<Mutex<Plant>>,
}

fn lock(plant: &Mutex<Plant>) -> MutexGuard<'_, Plant> {
    // A poisoned plant only means a test thread panicked mid-update; the data is still usable.
    plant.lock().unwrap_or_else(|e| e.into_inner())
}

impl SimJoint {
    pub fn new(config: &JointConfig, max_speed_dps: f32) -> Self {
        let sign = if config.encoder.inverted { -1.0 } else { 1.0 };
        let plant = Plant {
            angle_deg: 0.0_f32.clamp(config.encoder.min_angle_deg, config.encoder.max_angle_deg),
            pwm_duty: 0.0,
            pwm_freq_hz: 0.0,
            dir_high: false,
            encoder_connected: true,
            forced_limits: None,
            zero_duty: config.encoder.zero_angle_duty_cycle,
            deg_per_duty: sign * config.encoder.degrees_per_duty_cycle,
            motor_inverted: config.motor.inverted,
            min_deg: config.encoder.min_angle_deg,
            max_deg: config.encoder.max_angle_deg,
            max_speed_dps,
        };
        Self {
            plant: Arc::new(Mutex::new(plant)),
        }
    }

    /// Pin handles wired to this plant.
    pub fn pins(&self) -> JointPins {
        JointPins {
            motor_pwm: Box::new(SimPin::new(self, PinRole::MotorPwm)),
            motor_dir: Box::new(SimPin::new(self, PinRole::MotorDir)),
            encoder: Box::new(SimPin::new(self, PinRole::Encoder)),
            lim_min: Box::new(SimPin::new(self, PinRole::LimitMin)),
            lim_max: Box::new(SimPin::new(self, PinRole::LimitMax)),
        }
    }

    /// Advance the plant by `dt_s` seconds.
    pub fn step(&self, dt_s: f32) {
        let mut p = lock(&self.plant);
        let next = p.angle_deg + p.max_speed_dps * p.signed_duty() * dt_s;
        p.angle_deg = next.clamp(p.min_deg, p.max_deg);
    }

    pub fn angle_deg(&self) -> f32 {
        lock(&self.plant).angle_deg
    }

    pub fn set_angle(&self, deg: f32) {
        lock(&self.plant).angle_deg = deg;
    }

    /// Signed duty currently applied, positive toward the maximum angle.
    pub fn applied_duty(&self) -> f32 {
        lock(&self.plant).signed_duty()
    }

    pub fn pwm_frequency_hz(&self) -> f32 {
        lock(&self.plant).pwm_freq_hz
    }

    /// A disconnected encoder reads a flat-line zero duty cycle.
    pub fn disconnect_encoder(&self, disconnected: bool) {
        lock(&self.plant).encoder_connected = !disconnected;
    }

    /// Force both switch levels (e.g. a stuck switch); `None` restores position-driven switches.
    pub fn force_limit_switches(&self, levels: Option<(bool, bool)>) {
        lock(&self.plant).forced_limits = levels;
    }

    pub fn set_limit_switches(&self, at_min: bool, at_max: bool) {
        self.force_limit_switches(Some((at_min, at_max)));
    }
}

#[derive(Debug, Clone, Copy)]
enum PinRole {
    MotorPwm,
    MotorDir,
    Encoder,
    LimitMin,
    LimitMax,
}

struct SimPin {
    plant: Arc<Mutex<Plant>>,
    role: PinRole,
}

impl SimPin {
    fn new(joint: &SimJoint, role: PinRole) -> Self {
        Self {
            plant: Arc::clone(&joint.plant),
            role,
        }
    }
}

impl PwmOutput for SimPin {
    fn set_frequency_hz(&mut self, hz: f32) {
        lock(&self.plant).pwm_freq_hz = hz;
    }

    fn set_duty_cycle(&mut self, duty: f32) {
        if matches!(self.role, PinRole::MotorPwm) {
            lock(&self.plant).pwm_duty = duty;
        }
    }
}

impl DigitalOutput for SimPin {
    fn set_high(&mut self, high: bool) {
        if matches!(self.role, PinRole::MotorDir) {
            lock(&self.plant).dir_high = high;
        }
    }

    fn toggle(&mut self) -> bool {
        let mut p = lock(&self.plant);
        if matches!(self.role, PinRole::MotorDir) {
            p.dir_high = !p.dir_high;
        }
        p.dir_high
    }
}

impl PwmInput for SimPin {
    fn duty_cycle(&mut self) -> f32 {
        let p = lock(&self.plant);
        if !p.encoder_connected {
            return 0.0;
        }
        p.zero_duty + p.angle_deg / p.deg_per_duty
    }
}

impl DigitalInput for SimPin {
    fn is_high(&mut self) -> bool {
        let (at_min, at_max) = lock(&self.plant).limits();
        match self.role {
            PinRole::LimitMin => at_min,
            PinRole::LimitMax => at_max,
            PinRole::MotorPwm | PinRole::MotorDir | PinRole::Encoder => false,
        }
    }
}

/// A free-standing output pin, e.g. a status LED.
#[derive(Clone, Default)]
pub struct MemoryPin {
    level: Arc<Mutex<(bool, u32)>>,
}

impl MemoryPin {
    pub fn is_high(&self) -> bool {
        self.level.lock().map(|l| l.0).unwrap_or(false)
    }

    /// Number of writes or toggles so far.
    pub fn transitions(&self) -> u32 {
        self.level.lock().map(|l| l.1).unwrap_or(0)
    }
}

impl DigitalOutput for MemoryPin {
    fn set_high(&mut self, high: bool) {
        if let Ok(mut l) = self.level.lock() {
            l.0 = high;
            l.1 += 1;
        }
    }

    fn toggle(&mut self) -> bool {
        match self.level.lock() {
            Ok(mut l) => {
                l.0 = !l.0;
                l.1 += 1;
                l.0
            }
            Err(_) => false,
        }
    }
}
