//! Collision handling: the crash state machine, vehicle collision spins and the recovery pan

pub mod passengers;

use crate::crash::passengers::PassengerBehavior;
use crate::ferrari::{CAR_Y, Ferrari, MAN_SEAT, WOMAN_SEAT};
use crate::sound::Sound;
use crate::sprites::entry::{ENABLE, GROUND_PROPS};
use crate::sprites::{
    CRASH_SLOTS, CRASH_START, FERRARI, PASSENGER1, PASSENGER2, SpriteWorld, frames,
};
use bincode::{Decode, Encode};
use outrun_common::frontend::SoundQueue;
use outrun_config::BugMode;
use outrun_proc_macros::EnumDisplay;

const BUMP_SPEED: u16 = 0x64;
const SPIN_SPEED: u16 = 0xC8;

const BUMP_TICKS: u16 = 0x10;
const FLIP_TICKS: u16 = 0x20;
const SMOKE_TICKS: u16 = 0x18;
const POST_CRASH_TICKS: u16 = 0x30;
const PAN_STEP: i16 = 8;

/// Spin lengths picked by `init_spin1` for fast and slow impacts
pub const SPIN_FAST: u16 = 0x18;
pub const SPIN_SLOW: u16 = 0x0C;
const SPIN_SLIDE: i16 = 3;

const SMOKE_PRIORITY: u16 = 0x06;
const SMOKE_PAL: u8 = 0x05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay)]
pub enum CrashState {
    #[default]
    None,
    /// Impact this tick; picks bump, spin or flip handling
    Collision,
    Flip,
    Smoke,
    SmokeWait,
    /// Car stopped, passengers looking around
    PostCrash,
    /// Camera swings back to the road centre
    PanCamera,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay)]
pub enum CrashType {
    #[default]
    Bump,
    Spin,
    Flip,
}

impl CrashType {
    #[must_use]
    pub fn from_speed(speed: u16) -> Self {
        if speed < BUMP_SPEED {
            Self::Bump
        } else if speed < SPIN_SPEED {
            Self::Spin
        } else {
            Self::Flip
        }
    }
}

/// Routine run for the initial collision state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, EnumDisplay)]
pub enum CrashRoutine {
    DoBump,
    DoCollision,
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Crash {
    pub crash_state: CrashState,
    pub crash_type: CrashType,
    /// Last routine the collision state dispatched to
    pub last_routine: Option<CrashRoutine>,
    /// Vehicle collision spin controllers: 0 = idle, 1 = starting, 2 = spinning
    pub spin_control1: u8,
    pub spin_control2: u8,
    /// Set while the second spin controller owns the car
    pub spin_switch: bool,
    pub crash_spin_count: u8,
    pub spin_timer: u16,
    pub crash_counter: u16,
    collision_started: bool,
    /// Direction the car slides: -1 left, 1 right
    pub crash_side: i16,
    /// Height of the car above the road during a flip
    pub lift: i16,
    pub passenger_behavior: PassengerBehavior,
    pub coll_count: u16,
}

impl Crash {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything other than the driver controls the car.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.crash_state != CrashState::None || self.is_spinning()
    }

    #[must_use]
    pub fn is_spinning(&self) -> bool {
        self.spin_control1 != 0 || self.spin_control2 != 0
    }

    fn set_state(&mut self, state: CrashState) {
        log::debug!("Crash state {} -> {state}", self.crash_state);
        self.crash_state = state;
        self.crash_counter = 0;
    }

    /// Hit a solid object at `hit_x`. Ignored while a crash is already running.
    pub fn start_collision(&mut self, ferrari: &Ferrari, hit_x: i16, sound: &mut dyn SoundQueue) {
        if self.crash_state != CrashState::None {
            return;
        }

        self.crash_type = CrashType::from_speed(ferrari.speed());
        self.crash_side = if hit_x < ferrari.car_x_pos { 1 } else { -1 };
        self.spin_control1 = 0;
        self.spin_control2 = 0;
        self.spin_switch = false;
        self.collision_started = false;
        self.coll_count = self.coll_count.wrapping_add(1);
        log::debug!("Collision at speed {:X}: {}", ferrari.speed(), self.crash_type);

        self.set_state(CrashState::Collision);
        Sound::Crash.queue(sound);
    }

    /// Clip another vehicle at `other_x`. A second hit during a spin hands the car to the second
    /// spin controller.
    pub fn start_spin(&mut self, ferrari: &Ferrari, other_x: i16, sound: &mut dyn SoundQueue) {
        if self.crash_state != CrashState::None {
            return;
        }

        if !self.is_spinning() {
            self.spin_control1 = 1;
            self.spin_switch = false;
        } else if !self.spin_switch && self.spin_control2 == 0 {
            self.spin_control2 = 1;
            self.spin_switch = true;
        } else {
            return;
        }

        self.crash_side = if other_x < ferrari.car_x_pos { 1 } else { -1 };
        log::debug!("Vehicle collision, spin controller {}", if self.spin_switch { 2 } else { 1 });
        Sound::Bump.queue(sound);
    }

    /// Spin length for a first spin.
    ///
    /// The arcade expression `(count + 1) << 2 + (fast ? FAST : SLOW)` is parsed with the
    /// conditional applied to the whole shift, which is never zero, so every spin is a fast one.
    #[must_use]
    pub fn init_spin1_timer(spin_count: u8, car_increment: u32, bug_mode: BugMode) -> u16 {
        let fast = (car_increment >> 16) > 0xFF;
        match bug_mode {
            BugMode::Original => {
                let shifted = (u32::from(spin_count) + 1) << (2 + u32::from(fast));
                if shifted != 0 { SPIN_FAST } else { SPIN_SLOW }
            }
            BugMode::Patched => {
                ((u16::from(spin_count) + 1) << 2) + if fast { SPIN_FAST } else { SPIN_SLOW }
            }
        }
    }

    fn init_spin1(&mut self, ferrari: &Ferrari, bug_mode: BugMode) {
        self.spin_timer =
            Self::init_spin1_timer(self.crash_spin_count, ferrari.car_increment, bug_mode);
        self.crash_spin_count = self.crash_spin_count.wrapping_add(1);
    }

    fn init_spin2(&mut self) {
        self.spin_timer = SPIN_FAST << 1;
        self.crash_spin_count = self.crash_spin_count.wrapping_add(1);
    }

    /// Run one tick of whichever spin controller owns the car.
    fn spin_control(&mut self, ferrari: &mut Ferrari, world: &mut SpriteWorld, bug_mode: BugMode) {
        let control = if self.spin_switch { self.spin_control2 } else { self.spin_control1 };
        if control == 1 {
            if self.spin_switch {
                self.init_spin2();
                self.spin_control2 = 2;
            } else {
                self.init_spin1(ferrari, bug_mode);
                self.spin_control1 = 2;
            }
        }

        if self.do_spin(ferrari, world) {
            return;
        }

        if self.spin_switch {
            self.spin_control2 = 0;
            self.spin_switch = false;
        }
        self.spin_control1 = 0;
        world.jump_table[FERRARI].set_hflip(false);
        log::debug!("Spin finished");
    }

    /// Advance a spin by one tick. Returns false once the spin has run out.
    fn do_spin(&mut self, ferrari: &mut Ferrari, world: &mut SpriteWorld) -> bool {
        if self.spin_timer == 0 {
            return false;
        }
        self.spin_timer -= 1;

        decelerate(ferrari, 4);
        ferrari.car_x_pos = ferrari.car_x_pos.wrapping_add(self.crash_side * SPIN_SLIDE);

        let car = &mut world.jump_table[FERRARI];
        car.addr = frames::FERRARI_SPIN[usize::from((self.spin_timer >> 1) & 3)];
        car.set_hflip(self.crash_side < 0);
        true
    }

    /// Run one tick of the crash logic. Sprites must already hold the car's resting position.
    pub fn tick(
        &mut self,
        ferrari: &mut Ferrari,
        world: &mut SpriteWorld,
        bug_mode: BugMode,
        sound: &mut dyn SoundQueue,
    ) {
        match self.crash_state {
            CrashState::None => {
                if !self.is_spinning() {
                    return;
                }
                self.spin_control(ferrari, world, bug_mode);
            }
            CrashState::Collision => match self.crash_type {
                CrashType::Bump => self.do_bump(ferrari),
                CrashType::Spin | CrashType::Flip => {
                    self.do_collision(ferrari, world, bug_mode, sound);
                }
            },
            CrashState::Flip => self.do_flip(ferrari, world),
            CrashState::Smoke => self.trigger_smoke(ferrari, world),
            CrashState::SmokeWait => self.smoke_wait(world),
            CrashState::PostCrash => {
                self.crash_counter += 1;
                if self.crash_counter >= POST_CRASH_TICKS {
                    self.set_state(CrashState::PanCamera);
                }
            }
            CrashState::PanCamera => self.pan_camera(ferrari),
            CrashState::Restart => {
                self.end_collision(ferrari, world);
                return;
            }
        }

        self.update_sprites(world);
    }

    fn do_bump(&mut self, ferrari: &mut Ferrari) {
        self.last_routine = Some(CrashRoutine::DoBump);

        ferrari.car_increment -= ferrari.car_increment >> 2;
        ferrari.car_x_pos = ferrari.car_x_pos.wrapping_add(self.crash_side * 2);

        self.crash_counter += 1;
        if self.crash_counter >= BUMP_TICKS {
            ferrari.reset_motion();
            self.set_state(CrashState::PostCrash);
        }
    }

    fn do_collision(
        &mut self,
        ferrari: &mut Ferrari,
        world: &mut SpriteWorld,
        bug_mode: BugMode,
        sound: &mut dyn SoundQueue,
    ) {
        self.last_routine = Some(CrashRoutine::DoCollision);

        if self.crash_type == CrashType::Flip {
            self.passenger_behavior = PassengerBehavior::FlipStart;
            Sound::PassengerScream.queue(sound);
            self.set_state(CrashState::Flip);
            return;
        }

        if !self.collision_started {
            self.collision_started = true;
            self.init_spin1(ferrari, bug_mode);
            Sound::Screech.queue(sound);
        }

        if !self.do_spin(ferrari, world) {
            self.set_state(CrashState::Smoke);
        }
    }

    fn do_flip(&mut self, ferrari: &mut Ferrari, world: &mut SpriteWorld) {
        let t = self.crash_counter;
        let car = &mut world.jump_table[FERRARI];
        car.addr = frames::FERRARI_FLIP[usize::from(t * 4 / FLIP_TICKS).min(3)];
        self.lift = ((t * (FLIP_TICKS - t)) >> 2) as i16;

        decelerate(ferrari, 3);
        ferrari.car_x_pos = ferrari.car_x_pos.wrapping_add(self.crash_side * 2);

        self.crash_counter += 1;
        if self.crash_counter >= FLIP_TICKS {
            self.lift = 0;
            self.set_state(CrashState::Smoke);
        }
    }

    fn trigger_smoke(&mut self, ferrari: &mut Ferrari, world: &mut SpriteWorld) {
        ferrari.reset_motion();
        if self.passenger_behavior == PassengerBehavior::FlipStart {
            world.jump_table[FERRARI].addr = frames::FERRARI_FLIP[3];
        }

        for (i, index) in (CRASH_START..CRASH_START + CRASH_SLOTS).enumerate() {
            let smoke = &mut world.jump_table[index];
            smoke.control = ENABLE;
            smoke.xw1 = (i as i16 - 1) * 0x10;
            smoke.xw2 = 0;
            smoke.counter = i as u16;
            smoke.pal_src = SMOKE_PAL;
        }
        self.set_state(CrashState::SmokeWait);
    }

    fn smoke_wait(&mut self, world: &mut SpriteWorld) {
        for index in CRASH_START..CRASH_START + CRASH_SLOTS {
            let smoke = &mut world.jump_table[index];
            smoke.counter += 1;
            smoke.xw2 -= 1;
        }

        self.crash_counter += 1;
        if self.crash_counter >= SMOKE_TICKS {
            hide_smoke(world);
            self.set_state(CrashState::PostCrash);
        }
    }

    /// Slide the stopped car back to the middle of the road; the camera follows it.
    pub fn pan_camera(&mut self, ferrari: &mut Ferrari) {
        let x = ferrari.car_x_pos;
        ferrari.car_x_pos = if x.abs() <= PAN_STEP { 0 } else { x - PAN_STEP * x.signum() };
        ferrari.car_x_old = x;

        if ferrari.car_x_pos == 0 {
            self.set_state(CrashState::Restart);
        }
    }

    /// Hand the car back to the driver.
    pub fn end_collision(&mut self, ferrari: &mut Ferrari, world: &mut SpriteWorld) {
        log::debug!("Crash finished after {} collisions", self.coll_count);
        ferrari.reset_motion();
        hide_smoke(world);
        world.jump_table[FERRARI].set_hflip(false);

        let coll_count = self.coll_count;
        *self = Self { coll_count, ..Self::default() };
    }

    fn update_sprites(&self, world: &mut SpriteWorld) {
        let car = &mut world.jump_table[FERRARI];
        let (car_x, car_y) = (car.x, CAR_Y - self.lift);
        car.y = car_y;

        let ejected = self.passenger_behavior == PassengerBehavior::FlipStart;
        for (index, passenger_frames, seat, side) in [
            (PASSENGER1, &frames::MAN, MAN_SEAT, -1),
            (PASSENGER2, &frames::WOMAN, WOMAN_SEAT, 1),
        ] {
            let passenger = &mut world.jump_table[index];
            self.passenger_behavior.run(passenger, passenger_frames, side);
            passenger.x = car_x.wrapping_add(passenger.xw1);
            passenger.y = if ejected { CAR_Y + passenger.xw2 } else { car_y + seat.1 };
        }

        for index in CRASH_START..CRASH_START + CRASH_SLOTS {
            let smoke = &mut world.jump_table[index];
            if smoke.is_enabled() {
                smoke.addr = frames::SMOKE[usize::from((smoke.counter >> 2) & 1)];
                smoke.x = car_x.wrapping_add(smoke.xw1);
                smoke.y = CAR_Y + smoke.xw2;
                smoke.zoom = 0x1FF;
                smoke.priority = SMOKE_PRIORITY;
                smoke.draw_props = GROUND_PROPS;
                world.do_spr_order_shadows(index);
            }
        }
    }
}

/// Shed 1/2^shift of the car's speed.
fn decelerate(ferrari: &mut Ferrari, shift: u32) {
    ferrari.car_increment -= ferrari.car_increment >> shift;
    ferrari.revs -= ferrari.revs >> shift;
}

fn hide_smoke(world: &mut SpriteWorld) {
    for index in CRASH_START..CRASH_START + CRASH_SLOTS {
        world.jump_table[index].disable();
    }
}
