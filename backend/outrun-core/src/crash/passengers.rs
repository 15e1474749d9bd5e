//! Passenger animation while the car is crashing

use crate::sprites::entry::Entry;
use crate::sprites::frames::PassengerFrames;
use bincode::{Decode, Encode};
use outrun_proc_macros::EnumDisplay;

// reload sub-states
pub const FLIP_OUT: u8 = 0;
pub const SIT_UP: u8 = 1;
pub const TURN_HEAD: u8 = 2;
pub const TURN_HEAD_BACK: u8 = 3;

pub const FLIP_OUT_TICKS: u16 = 0x10;
pub const SIT_UP_TICKS: u16 = 0x0C;
pub const HEAD_TURN_TICKS: u16 = 8;
/// Ground level relative to the car's seat
const LANDING_Y: i16 = 0x08;

/// Which routine animates the passengers this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay)]
pub enum PassengerBehavior {
    /// Passengers stay in the car and look about
    #[default]
    CrashPassengers,
    /// Passengers are thrown clear of a flipping car, then sit up
    FlipStart,
}

impl PassengerBehavior {
    /// `side` is the direction this passenger is thrown: -1 left, 1 right.
    pub fn run(self, entry: &mut Entry, frames: &PassengerFrames, side: i16) {
        match self {
            Self::CrashPassengers => do_crash_passengers(entry, frames),
            Self::FlipStart => flip_start(entry, frames, side),
        }
    }
}

/// Step a passenger thrown from the car: an arc through the air, a pause sitting up on the road,
/// then the same head turning as passengers who stayed in.
pub fn flip_start(entry: &mut Entry, frames: &PassengerFrames, side: i16) {
    match entry.reload {
        FLIP_OUT => crash_pass_flip(entry, frames, side),
        SIT_UP => {
            entry.addr = frames.sit_up;
            entry.counter += 1;
            if entry.counter >= SIT_UP_TICKS {
                entry.counter = 0;
                entry.reload = TURN_HEAD;
            }
        }
        _ => do_crash_passengers(entry, frames),
    }
}

fn crash_pass_flip(entry: &mut Entry, frames: &PassengerFrames, side: i16) {
    let t = entry.counter as i16;
    entry.addr = frames.flip;
    entry.xw1 += side * 3;
    entry.xw2 = LANDING_Y - ((t * (FLIP_OUT_TICKS as i16 - t)) >> 1);

    entry.counter += 1;
    if entry.counter >= FLIP_OUT_TICKS {
        entry.counter = 0;
        entry.xw2 = LANDING_Y;
        entry.reload = SIT_UP;
    }
}

/// Alternate between looking one way and the other.
pub fn do_crash_passengers(entry: &mut Entry, frames: &PassengerFrames) {
    if entry.reload < TURN_HEAD {
        entry.reload = TURN_HEAD;
        entry.counter = 0;
    }

    entry.addr = frames.head[usize::from(entry.reload - TURN_HEAD)];
    entry.counter += 1;
    if entry.counter >= HEAD_TURN_TICKS {
        entry.counter = 0;
        entry.reload = if entry.reload == TURN_HEAD { TURN_HEAD_BACK } else { TURN_HEAD };
    }
}
