//! Conversion of raw cabinet controls into the adjusted values the car logic reads

use bincode::{Decode, Encode};
use outrun_config::{BugMode, GearMode, InputMode, OutRunConfig, OutRunInputs};

pub const STEER_CENTRE: u8 = 0x80;
pub const STEER_MIN: u8 = 0x48;
pub const STEER_MAX: u8 = 0xB8;
const STEER_DEAD_ZONE: i16 = 4;

pub const PEDAL_MIN: u8 = 0x30;
pub const PEDAL_MAX: u8 = 0xD0;

// Automatic gearbox shift points, integer revs
const AUTO_UPSHIFT_REVS: i32 = 0xF0;
const AUTO_DOWNSHIFT_REVS: i32 = 0x80;

#[derive(Debug, Clone, Encode, Decode)]
pub struct Inputs {
    /// Signed steering, negative = left
    pub steering_adjust: i16,
    pub acc_adjust: u8,
    pub brake_adjust: u8,
    pub gear_high: bool,
    steering_sim: u8,
    accel_sim: u8,
    brake_sim: u8,
    gear_toggle_prev: bool,
}

impl Default for Inputs {
    fn default() -> Self {
        Self::new()
    }
}

impl Inputs {
    #[must_use]
    pub fn new() -> Self {
        Self {
            steering_adjust: 0,
            acc_adjust: 0,
            brake_adjust: 0,
            gear_high: false,
            steering_sim: STEER_CENTRE,
            accel_sim: PEDAL_MIN,
            brake_sim: PEDAL_MIN,
            gear_toggle_prev: false,
        }
    }

    pub fn adjust_inputs(&mut self, raw: &OutRunInputs, config: &OutRunConfig) {
        let (steering, accel, brake) = match config.input_mode {
            InputMode::Analog => (raw.steering, raw.accel, raw.brake),
            InputMode::Digital => self.simulate_analog(raw, config),
        };

        self.steering_adjust = adjust_steering(steering, config.bug_mode);
        self.acc_adjust = adjust_pedal(accel);
        self.brake_adjust = adjust_pedal(brake);
    }

    /// Ramp the simulated wheel and pedals towards the pressed buttons.
    fn simulate_analog(&mut self, raw: &OutRunInputs, config: &OutRunConfig) -> (u8, u8, u8) {
        let steer_step = config.steer_speed * 4;
        self.steering_sim = match (raw.left, raw.right) {
            (true, false) => self.steering_sim.saturating_sub(steer_step).max(STEER_MIN),
            (false, true) => self.steering_sim.saturating_add(steer_step).min(STEER_MAX),
            _ => step_towards(self.steering_sim, STEER_CENTRE, steer_step),
        };

        let pedal_step = config.pedal_speed * 8;
        self.accel_sim = ramp_pedal(self.accel_sim, raw.accel_pressed, pedal_step);
        self.brake_sim = ramp_pedal(self.brake_sim, raw.brake_pressed, pedal_step);

        (self.steering_sim, self.accel_sim, self.brake_sim)
    }

    /// Select the gear for this tick. `revs` is only used by the automatic gearbox.
    pub fn update_gear(&mut self, raw: &OutRunInputs, config: &OutRunConfig, revs: i32) {
        match (config.gear_mode, config.input_mode) {
            (GearMode::Automatic, _) => self.gear_high = select_auto_gear(self.gear_high, revs),
            (GearMode::Manual, InputMode::Analog) => self.gear_high = raw.gear_high,
            (GearMode::Manual, InputMode::Digital) => {
                if raw.gear_toggle && !self.gear_toggle_prev {
                    self.gear_high = !self.gear_high;
                }
            }
        }
        self.gear_toggle_prev = raw.gear_toggle;
    }
}

fn step_towards(value: u8, target: u8, step: u8) -> u8 {
    if value < target {
        value.saturating_add(step).min(target)
    } else {
        value.saturating_sub(step).max(target)
    }
}

fn ramp_pedal(value: u8, pressed: bool, step: u8) -> u8 {
    let target = if pressed { PEDAL_MAX } else { PEDAL_MIN };
    step_towards(value, target, step)
}

/// Signed steering from the raw wheel byte, with a dead zone around the centre.
///
/// The arcade code only zeroes small right turns: the comparison is unsigned, so -1..-3 read as
/// large values and survive. `BugMode::Patched` uses a symmetric dead zone.
#[must_use]
pub fn adjust_steering(raw: u8, bug_mode: BugMode) -> i16 {
    let steering = i16::from(raw.clamp(STEER_MIN, STEER_MAX)) - i16::from(STEER_CENTRE);

    let in_dead_zone = match bug_mode {
        BugMode::Original => (steering as u16) < STEER_DEAD_ZONE as u16,
        BugMode::Patched => steering.abs() < STEER_DEAD_ZONE,
    };
    if in_dead_zone { 0 } else { steering }
}

/// Pedal byte scaled so the usable travel covers 0-0xFF.
#[must_use]
pub fn adjust_pedal(raw: u8) -> u8 {
    let travel = raw.clamp(PEDAL_MIN, PEDAL_MAX) - PEDAL_MIN;
    (u16::from(travel) * 0xFF / u16::from(PEDAL_MAX - PEDAL_MIN)) as u8
}

#[must_use]
pub fn select_auto_gear(gear_high: bool, revs: i32) -> bool {
    let revs = revs >> 16;
    if gear_high { revs >= AUTO_DOWNSHIFT_REVS } else { revs >= AUTO_UPSHIFT_REVS }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn steering_dead_zone_is_asymmetric_with_arcade_bugs() {
        assert_eq!(adjust_steering(0x82, BugMode::Original), 0);
        assert_eq!(adjust_steering(0x7E, BugMode::Original), -2);
        assert_eq!(adjust_steering(0x7E, BugMode::Patched), 0);
        assert_eq!(adjust_steering(0x82, BugMode::Patched), 0);
        assert_eq!(adjust_steering(0x90, BugMode::Original), 0x10);
    }

    #[test]
    fn steering_and_pedals_clamp() {
        assert_eq!(adjust_steering(0x00, BugMode::Original), -0x38);
        assert_eq!(adjust_steering(0xFF, BugMode::Original), 0x38);

        assert_eq!(adjust_pedal(0x00), 0);
        assert_eq!(adjust_pedal(0x30), 0);
        assert_eq!(adjust_pedal(0x80), 0x7F);
        assert_eq!(adjust_pedal(0xD0), 0xFF);
        assert_eq!(adjust_pedal(0xFF), 0xFF);
    }

    #[test]
    fn digital_ramps() {
        let config = OutRunConfig {
            input_mode: InputMode::Digital,
            steer_speed: 4,
            pedal_speed: 2,
            ..OutRunConfig::default()
        };
        let mut inputs = Inputs::new();
        let held = OutRunInputs { right: true, accel_pressed: true, ..OutRunInputs::default() };

        inputs.adjust_inputs(&held, &config);
        assert_eq!(inputs.steering_adjust, 0x10);
        assert_eq!(inputs.acc_adjust, adjust_pedal(PEDAL_MIN + 0x10));

        for _ in 0..10 {
            inputs.adjust_inputs(&held, &config);
        }
        assert_eq!(inputs.steering_adjust, 0x38);
        assert_eq!(inputs.acc_adjust, 0xFF);

        // Released controls return to centre and zero
        for _ in 0..20 {
            inputs.adjust_inputs(&OutRunInputs::default(), &config);
        }
        assert_eq!(inputs.steering_adjust, 0);
        assert_eq!(inputs.acc_adjust, 0);
    }

    #[test]
    fn gear_selection() {
        let mut inputs = Inputs::new();
        let digital = OutRunConfig { input_mode: InputMode::Digital, ..OutRunConfig::default() };
        let toggle = OutRunInputs { gear_toggle: true, ..OutRunInputs::default() };

        inputs.update_gear(&toggle, &digital, 0);
        inputs.update_gear(&toggle, &digital, 0);
        assert!(inputs.gear_high, "held toggle only shifts once");
        inputs.update_gear(&OutRunInputs::default(), &digital, 0);
        inputs.update_gear(&toggle, &digital, 0);
        assert!(!inputs.gear_high);

        let auto = OutRunConfig { gear_mode: GearMode::Automatic, ..OutRunConfig::default() };
        inputs.update_gear(&OutRunInputs::default(), &auto, 0xF0 << 16);
        assert!(inputs.gear_high);
        inputs.update_gear(&OutRunInputs::default(), &auto, 0x90 << 16);
        assert!(inputs.gear_high);
        inputs.update_gear(&OutRunInputs::default(), &auto, 0x7F << 16);
        assert!(!inputs.gear_high);
    }
}
