//! Autopilot for the attract-mode demo

use crate::ferrari::Ferrari;
use crate::initengine::{InitEngine, SplitState};
use crate::inputs::{PEDAL_MAX, PEDAL_MIN, STEER_CENTRE};
use crate::outils::Rng;
use crate::road::Road;
use crate::track::Level;
use bincode::{Decode, Encode};
use outrun_common::num::Fixed16;
use outrun_config::OutRunInputs;

/// Road line the autopilot aims at
pub const LOOK_AHEAD_LINE: usize = 0x40;
/// Road positions ahead checked for a tight curve
const CURVE_LOOK_AHEAD: u16 = 8;
const TIGHT_CURVE: u8 = 0x40;
const CORNER_SPEED: u16 = 0xC0;
const MAX_STEER: i32 = 0x38;

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct AttractAi {
    /// Fork to take at the next road split: 0 = left, 1 = right
    pub route: u8,
    route_chosen: bool,
}

impl AttractAi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw control bytes for this tick, as if read from the cabinet.
    pub fn tick(
        &mut self,
        road: &Road,
        level: &Level,
        ferrari: &Ferrari,
        engine: &InitEngine,
        rng: &mut Rng,
    ) -> OutRunInputs {
        if engine.split_state == SplitState::Check {
            self.route_chosen = false;
        } else if !self.route_chosen {
            self.route = (rng.random() & 1) as u8;
            self.route_chosen = true;
            log::debug!("Attract mode picked route {}", self.route);
        }

        let target = if engine.split_state == SplitState::Check {
            0
        } else if self.route == 0 {
            -(road.road_width as i16)
        } else {
            road.road_width as i16
        };

        let curve = level.curve_at(road.road_pos.whole().wrapping_add(CURVE_LOOK_AHEAD));
        let braking = curve.unsigned_abs() > TIGHT_CURVE && ferrari.speed() > CORNER_SPEED;

        OutRunInputs {
            steering: steer_towards(road, ferrari.car_x_pos, engine.camera_x, target),
            accel: if braking { PEDAL_MIN } else { PEDAL_MAX },
            brake: if braking { PEDAL_MAX } else { PEDAL_MIN },
            ..OutRunInputs::default()
        }
    }
}

/// Wheel byte that turns the car towards `target` (offset from the road centre) at the
/// look-ahead line.
#[must_use]
pub fn steer_towards(road: &Road, car_x: i16, camera_x: i16, target: i16) -> u8 {
    let scale = crate::road::line_scale(LOOK_AHEAD_LINE);
    let aim = road.centre_x(LOOK_AHEAD_LINE) + ((i32::from(target) * scale) >> 9);
    let car = i32::from(car_x) - i32::from(camera_x);

    let steer = ((aim - car) >> 1).clamp(-MAX_STEER, MAX_STEER);
    (i32::from(STEER_CENTRE) + steer) as u8
}
