//! Traffic cars: spawning, movement relative to the player, queueing behind slower cars and
//! collisions with the player

use crate::ferrari::Ferrari;
use crate::outils::Rng;
use crate::road::Road;
use crate::sound::Sound;
use crate::sprites::entry::{self, ENABLE, SHADOW, TRAFFIC};
use crate::sprites::{self, SpriteWorld, TRAFFIC_SLOTS, TRAFFIC_START, frames};
use bincode::{Decode, Encode};
use outrun_common::frontend::SoundQueue;

/// Lane picked by bits 1-2 of the random number; the middle lane is twice as likely
pub const LANE_SELECT: [u8; 4] = [0, 1, 2, 1];
/// Lane centres, outwards from the road centre
pub const LANE_X: [i16; 3] = [0x22, 0x68, 0xAE];

// reload bits
pub const RHS: u8 = 0x80;
const HORNED: u8 = 0x40;
const LANE_MASK: u8 = 0x03;

pub const SPAWN_Z: u32 = 0x1C0 << 16;
const FAR_CLIP: u32 = 0x1FF << 16;
const PROXIMITY_Z: u32 = 0x20 << 16;
/// Road lines in front of the camera where the player's car sits
const PLAYER_LINES: u32 = 0x10;
const COLLISION_X: i16 = 0x38;
const HIT_COOLDOWN: u16 = 0x10;
const HORN_LINES: u32 = 0x30;
const HORN_X: i16 = 0x60;

const BASE_SPEED: u16 = 0x60;
const TRAFFIC_PAL: u8 = 0x10;
const SHADOW_OFFSET: u8 = 0x10;
/// One spawn attempt in this many ticks on average
const SPAWN_MASK: u16 = 0x0F;

#[derive(Debug, Clone, Encode, Decode)]
pub struct Traffic {
    /// Side the next car spawns on, true = right
    pub spawn_location: bool,
    pub traffic_count: u8,
    pub traffic_max: u8,
}

impl Traffic {
    #[must_use]
    pub fn new(traffic_max: u8) -> Self {
        Self {
            spawn_location: false,
            traffic_count: 0,
            traffic_max: traffic_max.min(TRAFFIC_SLOTS as u8),
        }
    }

    pub fn reset(&mut self, world: &mut SpriteWorld) {
        for index in TRAFFIC_START..TRAFFIC_START + TRAFFIC_SLOTS {
            world.jump_table[index].disable();
        }
        self.traffic_count = 0;
        self.spawn_location = false;
    }

    /// Start a car at the far end of the road, alternating sides.
    pub fn spawn(&mut self, world: &mut SpriteWorld, rnd: u16) -> Option<usize> {
        if self.traffic_count >= self.traffic_max {
            return None;
        }
        let index = (TRAFFIC_START..TRAFFIC_START + usize::from(self.traffic_max))
            .find(|&i| !world.jump_table[i].is_enabled())?;

        let rhs = self.spawn_location;
        self.spawn_location = !rhs;
        let lane = LANE_SELECT[usize::from((rnd & 6) >> 1)];
        let model = usize::from((rnd >> 4) & 3);

        let entry = &mut world.jump_table[index];
        *entry = entry::Entry {
            jump_index: index as u8,
            control: ENABLE | SHADOW | TRAFFIC,
            z: SPAWN_Z,
            addr: frames::TRAFFIC_MODELS[model],
            pal_src: TRAFFIC_PAL + model as u8,
            shadow: SHADOW_OFFSET,
            reload: lane | if rhs { RHS } else { 0 },
            traffic_speed: BASE_SPEED + ((rnd >> 8) & 0x3F),
            ..entry::Entry::default()
        };

        self.traffic_count += 1;
        log::trace!("Spawned traffic {index} lane {lane} {}", if rhs { "right" } else { "left" });
        Some(index)
    }

    /// Move every car by one displayed frame's share of its speed relative to the player.
    pub fn move_traffic(world: &mut SpriteWorld, player_speed: u16, shift: u32) {
        for entry in &mut world.jump_table[TRAFFIC_START..TRAFFIC_START + TRAFFIC_SLOTS] {
            if entry.is_enabled() {
                let relative = i32::from(entry.traffic_speed) - i32::from(player_speed);
                entry::move_sprite(entry, relative << 11, shift);
            }
        }
    }

    /// Per-tick traffic logic. Returns the X of a car the player ran into.
    pub fn tick(
        &mut self,
        world: &mut SpriteWorld,
        road: &Road,
        ferrari: &Ferrari,
        rng: &mut Rng,
        sound: &mut dyn SoundQueue,
    ) -> Option<i16> {
        self.despawn(world);

        let rnd = rng.random();
        if ferrari.speed() != 0 && rnd & SPAWN_MASK == 0 {
            self.spawn(world, rng.random());
        }

        update_proximity(world);

        let mut hit = None;
        for index in TRAFFIC_START..TRAFFIC_START + TRAFFIC_SLOTS {
            let entry = &mut world.jump_table[index];
            if !entry.is_enabled() {
                continue;
            }

            entry.xw2 = lane_x(entry.reload, road.road_width);
            entry.counter = entry.counter.saturating_sub(1);

            let line = entry.z >> 16;
            let dx = (entry.xw2 - ferrari.car_x_pos).abs();
            if hit.is_none() && entry.counter == 0 && line < PLAYER_LINES && dx < COLLISION_X {
                entry.counter = HIT_COOLDOWN;
                hit = Some(entry.xw2);
            }

            if entry.reload & HORNED == 0
                && line < HORN_LINES
                && dx < HORN_X
                && ferrari.speed() > entry.traffic_speed
            {
                entry.reload |= HORNED;
                Sound::TrafficHorn.queue(sound);
            }

            match road.project(entry.z, entry.xw2) {
                Some(projection) => sprites::place_on_road(world, index, projection),
                None => self.remove(world, index),
            }
        }

        hit
    }

    fn despawn(&mut self, world: &mut SpriteWorld) {
        for index in TRAFFIC_START..TRAFFIC_START + TRAFFIC_SLOTS {
            let entry = &world.jump_table[index];
            if entry.is_enabled() && ((entry.z as i32) < 0 || entry.z > FAR_CLIP) {
                self.remove(world, index);
            }
        }
    }

    fn remove(&mut self, world: &mut SpriteWorld, index: usize) {
        log::trace!("Despawned traffic {index}");
        world.jump_table[index].disable();
        self.traffic_count = self.traffic_count.saturating_sub(1);
    }
}

/// X of a lane, on whichever road generator serves that side.
#[must_use]
pub fn lane_x(reload: u8, road_width: u16) -> i16 {
    let x = LANE_X[usize::from(reload & LANE_MASK).min(2)] + road_width as i16;
    if reload & RHS != 0 { x } else { -x }
}

/// Flag cars just ahead in the same lane and slow down to their speed.
fn update_proximity(world: &mut SpriteWorld) {
    let cars = &mut world.jump_table[TRAFFIC_START..TRAFFIC_START + TRAFFIC_SLOTS];

    for a in 0..cars.len() {
        let mut proximity = 0;
        let mut speed = cars[a].traffic_speed;
        for b in 0..cars.len() {
            let (car, other) = (&cars[a], &cars[b]);
            if a == b || !car.is_enabled() || !other.is_enabled() {
                continue;
            }
            let same_lane = (car.reload ^ other.reload) & (RHS | LANE_MASK) == 0;
            if same_lane && other.z > car.z && other.z - car.z < PROXIMITY_Z {
                proximity |= 1 << b;
                speed = speed.min(other.traffic_speed);
            }
        }

        cars[a].traffic_proximity = proximity;
        cars[a].traffic_speed = speed;
    }
}
