//! Player car: engine and speed model, steering, wheel state and the car's sprites

pub mod tables;

use crate::ferrari::tables::{
    BRAKE_SUBTRACT, BRAKE_THRESHOLDS, REV_FALL_START, REV_INC_LOOKUP, TORQUE_HIGH_GEAR,
    TORQUE_LOOKUP, TORQUE_LOW_GEAR,
};
use crate::inputs::Inputs;
use crate::sound::Sound;
use crate::sprites::entry::{ENABLE, Entry, GROUND_PROPS};
use crate::sprites::{FERRARI, FERRARI_SHADOW, PASSENGER1, PASSENGER2, SpriteWorld, frames};
use bincode::{Decode, Encode};
use outrun_common::frontend::SoundQueue;
use outrun_proc_macros::EnumDisplay;

/// Rev limiter, 16.16
pub const MAX_REVS: i32 = 0x013C_0000;

const GEAR_CHANGE_TICKS: u8 = 4;
const WHEEL_SPIN_ACC: u8 = 0xE0;
const WHEEL_SPIN_TICKS: u8 = 0x10;

const LOW_SPEED: i32 = 0x50;
const HARD_BRAKE: u8 = 0xA0;

/// Half the road's drivable width when the generators are together
pub const ROAD_EDGE: i16 = 0xD0;
const CAR_HALF_WIDTH: i16 = 0x20;
/// How far past the road edge the car may wander
const VERGE_WIDTH: i16 = 0x100;
const OFFROAD_DRAG: i32 = 0x2_0000;
const OFFROAD_MIN_SPEED: u16 = 0x50;

const SKID_SPEED: u16 = 0xC8;
const SKID_STEER: i16 = 0x28;

// Sprite layout
pub const CAR_Y: i16 = 0x1D8;
pub const CAR_PRIORITY: u16 = 0x08;
const CAR_PAL: u8 = 0x02;
const SHADOW_PAL: u8 = 0x01;
const MAN_PAL: u8 = 0x03;
const WOMAN_PAL: u8 = 0x04;
/// Passenger offsets from the car: (x, y)
pub const MAN_SEAT: (i16, i16) = (-0x0C, -0x1C);
pub const WOMAN_SEAT: (i16, i16) = (0x0C, -0x1C);
const TURN_SMALL: i16 = 0x0C;
const TURN_LARGE: i16 = 0x24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay)]
pub enum FerrariState {
    /// Set up the start line animation
    Seq1,
    /// Start line animation running
    Seq2,
    #[default]
    Init,
    Logic,
    /// Stage complete, coasting to a stop
    EndSeq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay)]
pub enum WheelState {
    #[default]
    OnRoad,
    LeftOff,
    RightOff,
    BothOff,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Ferrari {
    pub state: FerrariState,
    /// Torque index only moves once the race has started
    pub ingame_engine: bool,
    /// Speed, 16.16
    pub car_increment: u32,
    /// 16.16
    pub revs: i32,
    pub torque_index: u8,
    pub torque: u16,
    pub gear_high: bool,
    gear_counter: u8,
    pub wheel_spin: u8,
    acc_history: [u8; 2],
    brake_history: [u8; 2],
    pub acc_avg: u8,
    pub brake_avg: u8,
    /// Lateral position, positive = right of the road centre
    pub car_x_pos: i16,
    pub car_x_old: i16,
    pub steering: i16,
    pub wheel_state: WheelState,
    pub is_slipping: bool,
    pub skid_counter: u8,
    anim_seq_complete: bool,
}

impl Default for Ferrari {
    fn default() -> Self {
        Self::new()
    }
}

impl Ferrari {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: FerrariState::default(),
            ingame_engine: false,
            car_increment: 0,
            revs: 0,
            torque_index: 0,
            torque: TORQUE_LOOKUP[0],
            gear_high: false,
            gear_counter: 0,
            wheel_spin: 0,
            acc_history: [0; 2],
            brake_history: [0; 2],
            acc_avg: 0,
            brake_avg: 0,
            car_x_pos: 0,
            car_x_old: 0,
            steering: 0,
            wheel_state: WheelState::default(),
            is_slipping: false,
            skid_counter: 0,
            anim_seq_complete: false,
        }
    }

    /// Integer speed.
    #[must_use]
    pub fn speed(&self) -> u16 {
        (self.car_increment >> 16) as u16
    }

    pub fn set_state(&mut self, state: FerrariState) {
        if state != self.state {
            log::debug!("Ferrari state {} -> {state}", self.state);
            self.state = state;
        }
    }

    pub fn signal_anim_seq_complete(&mut self) {
        self.anim_seq_complete = true;
    }

    /// Stop the car dead, keeping its lateral position.
    pub fn reset_motion(&mut self) {
        self.car_increment = 0;
        self.revs = 0;
        self.torque_index = 0;
        self.torque = TORQUE_LOOKUP[0];
        self.gear_counter = 0;
        self.wheel_spin = 0;
        self.acc_history = [0; 2];
        self.brake_history = [0; 2];
        self.acc_avg = 0;
        self.brake_avg = 0;
        self.is_slipping = false;
        self.skid_counter = 0;
    }

    fn reset_car(&mut self) {
        self.reset_motion();
        self.gear_high = false;
        self.car_x_pos = 0;
        self.car_x_old = 0;
        self.steering = 0;
        self.wheel_state = WheelState::OnRoad;
    }

    /// Run one tick of the car state machine. `crashing` suppresses driver control while the
    /// crash logic owns the car.
    pub fn tick(
        &mut self,
        inputs: &Inputs,
        road_curve: i8,
        road_edge: i16,
        crashing: bool,
        sound: &mut dyn SoundQueue,
    ) {
        match self.state {
            FerrariState::Seq1 => {
                self.reset_car();
                self.set_state(FerrariState::Seq2);
            }
            FerrariState::Seq2 => {
                if self.anim_seq_complete {
                    self.anim_seq_complete = false;
                    self.set_state(FerrariState::Init);
                }
            }
            FerrariState::Init => {
                self.reset_car();
                self.set_state(FerrariState::Logic);
            }
            FerrariState::Logic => {
                if crashing {
                    return;
                }
                self.update_wheels(road_edge, sound);
                self.move_car(inputs.acc_adjust, inputs.brake_adjust, inputs.gear_high, sound);
                self.steer(inputs.steering_adjust);
                self.update_skid(road_curve, sound);
            }
            FerrariState::EndSeq => {
                if crashing {
                    return;
                }
                self.move_car(0, 0x80, self.gear_high, sound);
                self.steer(0);
            }
        }
    }

    /// Engine and speed model for one tick.
    pub fn move_car(&mut self, acc: u8, brake: u8, gear_high: bool, sound: &mut dyn SoundQueue) {
        self.acc_avg = trailing_average(&mut self.acc_history, acc);
        self.brake_avg = trailing_average(&mut self.brake_history, brake);

        if gear_high != self.gear_high {
            self.gear_high = gear_high;
            self.gear_counter = GEAR_CHANGE_TICKS;
            Sound::GearShift.queue(sound);
        }

        if self.ingame_engine {
            let target = if self.gear_high { TORQUE_HIGH_GEAR } else { TORQUE_LOW_GEAR };
            if self.torque_index < target {
                self.torque_index += 1;
            } else if self.torque_index > target {
                self.torque_index -= 1;
            }
        }
        self.torque = TORQUE_LOOKUP[usize::from(self.torque_index)];

        // Clutch is out while the gear change completes
        let target_revs = if self.gear_counter != 0 {
            self.gear_counter -= 1;
            if self.gear_counter == 0 && self.acc_avg >= WHEEL_SPIN_ACC {
                self.wheel_spin = WHEEL_SPIN_TICKS;
                Sound::WheelSpin.queue(sound);
            }
            0
        } else {
            i32::from(self.acc_avg) * (MAX_REVS >> 8)
        };
        self.wheel_spin = self.wheel_spin.saturating_sub(1);

        self.revs = next_revs(self.revs, target_revs, self.torque);
        self.revs = (self.revs - brake_subtract(self.brake_avg)).clamp(0, MAX_REVS);

        let target_speed = revs_to_speed(self.revs, self.torque);
        let speed = (self.car_increment >> 16) as i32;
        let step = if self.brake_avg >= HARD_BRAKE {
            8
        } else if speed < LOW_SPEED {
            4
        } else {
            2
        };
        let speed = if target_speed > speed {
            (speed + step).min(target_speed)
        } else {
            (speed - step).max(target_speed)
        };
        self.car_increment = (speed.max(0) as u32) << 16;
    }

    pub fn steer(&mut self, steering_adjust: i16) {
        self.car_x_old = self.car_x_pos;
        self.steering = steering_adjust;

        let speed = i32::from(self.speed()).min(0xA0);
        let delta = (i32::from(steering_adjust) * speed) >> 9;
        self.car_x_pos = (i32::from(self.car_x_pos) + delta)
            .clamp(-i32::from(ROAD_EDGE + VERGE_WIDTH), i32::from(ROAD_EDGE + VERGE_WIDTH))
            as i16;
    }

    /// Work out which wheels are off the tarmac and drag the engine down for each.
    pub fn update_wheels(&mut self, road_edge: i16, sound: &mut dyn SoundQueue) {
        let left_off = self.car_x_pos - CAR_HALF_WIDTH < -road_edge;
        let right_off = self.car_x_pos + CAR_HALF_WIDTH > road_edge;
        let wheel_state = match (left_off, right_off) {
            (false, false) => WheelState::OnRoad,
            (true, false) => WheelState::LeftOff,
            (false, true) => WheelState::RightOff,
            (true, true) => WheelState::BothOff,
        };

        if wheel_state != WheelState::OnRoad && self.wheel_state == WheelState::OnRoad {
            Sound::OffRoad.queue(sound);
        }
        self.wheel_state = wheel_state;

        if wheel_state != WheelState::OnRoad && self.speed() > OFFROAD_MIN_SPEED {
            let wheels = if wheel_state == WheelState::BothOff { 2 } else { 1 };
            self.revs = (self.revs - OFFROAD_DRAG * wheels).max(0);
        }
    }

    fn update_skid(&mut self, road_curve: i8, sound: &mut dyn SoundQueue) {
        // Skids when steering hard at speed, or with the curve pulling the other way
        let against_curve = i16::from(road_curve).signum() == -self.steering.signum()
            && road_curve.unsigned_abs() >= 0x40;
        let slipping = self.speed() >= SKID_SPEED
            && (self.steering.abs() >= SKID_STEER || against_curve);

        match (self.is_slipping, slipping) {
            (false, true) => Sound::Screech.queue(sound),
            (true, false) => Sound::TyreSquealStop.queue(sound),
            _ => {}
        }
        self.is_slipping = slipping;
        self.skid_counter = if slipping { self.skid_counter.saturating_add(1) } else { 0 };
    }

    /// Position the car, its shadow and the passengers. Frames are only chosen here when the
    /// crash logic isn't animating them.
    pub fn update_sprites(&self, world: &mut SpriteWorld, camera_x: i16, crashing: bool) {
        let car_x = self.car_x_pos.wrapping_sub(camera_x);

        let shadow = &mut world.jump_table[FERRARI_SHADOW];
        shadow.control = ENABLE;
        shadow.addr = frames::FERRARI_SHADOW;
        shadow.pal_src = SHADOW_PAL;
        place_car_sprite(shadow, car_x, CAR_PRIORITY + 1);

        let car = &mut world.jump_table[FERRARI];
        car.control |= ENABLE;
        car.pal_src = CAR_PAL;
        place_car_sprite(car, car_x, CAR_PRIORITY);
        if crashing {
            return;
        }

        let (frame, hflip) = self.steering_frame();
        car.addr = frame;
        car.set_hflip(hflip);

        let lean = self.steering.abs() >= TURN_LARGE;
        for (index, seat, passenger_frames, pal) in [
            (PASSENGER1, MAN_SEAT, frames::MAN, MAN_PAL),
            (PASSENGER2, WOMAN_SEAT, frames::WOMAN, WOMAN_PAL),
        ] {
            let passenger = &mut world.jump_table[index];
            passenger.control = ENABLE;
            passenger.pal_src = pal;
            passenger.xw1 = seat.0;
            passenger.xw2 = seat.1;
            passenger.reload = 0;
            passenger.counter = 0;
            passenger.addr = if lean { passenger_frames.head[0] } else { passenger_frames.sit };
            passenger.set_hflip(hflip);
            place_car_sprite(passenger, car_x.wrapping_add(seat.0), CAR_PRIORITY - 1);
            passenger.y = CAR_Y + seat.1;
        }
    }

    fn steering_frame(&self) -> (u32, bool) {
        let frame = match self.steering.abs() {
            s if s < TURN_SMALL => frames::FERRARI_STRAIGHT,
            s if s < TURN_LARGE => frames::FERRARI_LEFT[0],
            _ => frames::FERRARI_LEFT[1],
        };
        (frame, self.steering > 0)
    }
}

pub(crate) fn place_car_sprite(entry: &mut Entry, x: i16, priority: u16) {
    entry.x = x;
    entry.y = CAR_Y;
    entry.zoom = 0x1FF;
    entry.priority = priority;
    entry.road_priority = 0;
    entry.draw_props = GROUND_PROPS;
}

/// Average of the new sample and the three before it.
/// Average of this sample and the previous two.
fn trailing_average(history: &mut [u8; 2], sample: u8) -> u8 {
    let sum = u16::from(sample) + u16::from(history[0]) + u16::from(history[1]);
    history[1] = history[0];
    history[0] = sample;
    (sum / 3) as u8
}

/// Move revs towards the target by the rising or falling step for the current revs.
#[must_use]
pub fn next_revs(revs: i32, target: i32, torque: u16) -> i32 {
    let band = (revs >> 17).clamp(0, REV_FALL_START as i32 - 1) as usize;

    if revs < target {
        let inc = i32::from(REV_INC_LOOKUP[band]) * i32::from(torque);
        (revs + inc).min(target)
    } else {
        let dec = i32::from(REV_INC_LOOKUP[REV_FALL_START + band]) * i32::from(torque);
        (revs - dec).max(target)
    }
}

#[must_use]
pub fn brake_subtract(brake: u8) -> i32 {
    let tier = BRAKE_THRESHOLDS.iter().filter(|&&threshold| brake >= threshold).count();
    BRAKE_SUBTRACT[tier]
}

/// Integer speed produced by the given revs at the given torque.
#[must_use]
pub fn revs_to_speed(revs: i32, torque: u16) -> i32 {
    ((((revs >> 16) * 0x1A90) >> 8) << 8) / i32::from(torque).max(1)
}
