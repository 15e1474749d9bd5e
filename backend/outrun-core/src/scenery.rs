//! Roadside objects spawned from the level's scenery table

use crate::road::Road;
use crate::sprites::entry::{ENABLE, Entry, HFLIP, SHADOW};
use crate::sprites::{self, SCENERY_SLOTS, SCENERY_START, SpriteWorld};
use crate::track::{Level, SceneryPlacement};
use bincode::{Decode, Encode};
use outrun_common::num::Fixed16;

/// Road positions ahead of the player at which objects appear
pub const SPAWN_AHEAD: u16 = 0x1F;
/// Road lines per coarse road position
const LINES_PER_POSITION_SHIFT: u32 = 4;

const PLAYER_LINES: u32 = 0x10;
const COLLISION_X: i16 = 0x40;
const SHADOW_OFFSET: u8 = 0x10;

// reload flags
const COLLIDABLE: u8 = 0x01;
const HIT: u8 = 0x02;

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Scenery {
    /// Next entry of the level's scenery table to spawn
    pub next_index: usize,
}

impl Scenery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, world: &mut SpriteWorld) {
        self.next_index = 0;
        for index in SCENERY_START..SCENERY_START + SCENERY_SLOTS {
            world.jump_table[index].disable();
        }
    }

    /// Spawn, project and retire scenery for this tick. Returns the X of a solid object the car
    /// ran into.
    pub fn tick(
        &mut self,
        world: &mut SpriteWorld,
        road: &Road,
        level: &Level,
        car_x: i16,
    ) -> Option<i16> {
        self.spawn(world, level, road.road_pos.whole());

        let mut hit = None;
        for index in SCENERY_START..SCENERY_START + SCENERY_SLOTS {
            let entry = &mut world.jump_table[index];
            if !entry.is_enabled() {
                continue;
            }

            let Some(placement) = level.scenery_placement(usize::from(entry.counter)) else {
                entry.disable();
                continue;
            };
            let ahead = (u32::from(placement.position) << 16).wrapping_sub(road.road_pos);
            if (ahead as i32) < 0 {
                entry.disable();
                continue;
            }
            entry.z = ahead << LINES_PER_POSITION_SHIFT;

            let line = entry.z >> 16;
            if entry.reload & (COLLIDABLE | HIT) == COLLIDABLE
                && line < PLAYER_LINES
                && (i32::from(entry.xw1) - i32::from(car_x)).abs() < i32::from(COLLISION_X)
            {
                entry.reload |= HIT;
                hit = Some(entry.xw1);
            }

            // Objects beyond the last road line stay spawned but undrawn
            if let Some(projection) = road.project(entry.z, entry.xw1) {
                sprites::place_on_road(world, index, projection);
            }
        }

        hit
    }

    fn spawn(&mut self, world: &mut SpriteWorld, level: &Level, position: u16) {
        while let Some(placement) = level.scenery_placement(self.next_index) {
            if placement.position > position.saturating_add(SPAWN_AHEAD) {
                break;
            }
            if placement.position < position {
                // Already behind the car
                self.next_index += 1;
                continue;
            }

            let Some(index) = (SCENERY_START..SCENERY_START + SCENERY_SLOTS)
                .find(|&i| !world.jump_table[i].is_enabled())
            else {
                log::trace!("No free scenery slot for placement {}", self.next_index);
                break;
            };

            world.jump_table[index] = scenery_entry(index, self.next_index, &placement);
            self.next_index += 1;
        }
    }
}

fn scenery_entry(index: usize, placement_index: usize, placement: &SceneryPlacement) -> Entry {
    let mut control = ENABLE;
    if placement.hflip {
        control |= HFLIP;
    }
    if placement.shadow {
        control |= SHADOW;
    }

    Entry {
        jump_index: index as u8,
        control,
        addr: placement.frame,
        pal_src: placement.palette,
        draw_props: placement.draw_props,
        shadow: if placement.shadow { SHADOW_OFFSET } else { 0 },
        xw1: placement.x,
        reload: if placement.collidable { COLLIDABLE } else { 0 },
        counter: placement_index as u16,
        ..Entry::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprites::frames;
    use crate::testdata::{self, RecordingSink};
    use outrun_config::BugMode;
    use test_log::test;

    fn placement(position: u16, x: i16, collidable: bool) -> SceneryPlacement {
        SceneryPlacement {
            position,
            x,
            frame: frames::SHADOW,
            draw_props: 0,
            palette: 0x20,
            collidable,
            hflip: false,
            shadow: false,
        }
    }

    fn setup(placements: Vec<SceneryPlacement>) -> (Level, Road) {
        let mut level = testdata::straight_level(0x100);
        level.scenery = testdata::scenery_table(&placements);
        let mut road = Road::new();
        road.load_level(&level, &mut RecordingSink::default());
        road.tick(&level, &testdata::height_map(&[]), 0, BugMode::Original);
        (level, road)
    }

    #[test]
    fn spawns_ahead_and_retires_behind() {
        let (level, mut road) =
            setup(vec![placement(0x08, 0x100, false), placement(0x40, -0x100, false)]);
        let mut world = SpriteWorld::new(false);
        let mut scenery = Scenery::new();

        scenery.tick(&mut world, &road, &level, 0);
        let entry = &world.jump_table[SCENERY_START];
        assert!(entry.is_enabled());
        assert_eq!(entry.z, 0x80 << 16);
        assert_eq!(entry.road_priority, 0x80);
        assert!(entry.x > 0);
        // Second object is too far away to spawn yet
        assert!(!world.jump_table[SCENERY_START + 1].is_enabled());
        assert_eq!(scenery.next_index, 1);

        road.road_pos = 0x0008_8000;
        scenery.tick(&mut world, &road, &level, 0);
        assert!(!world.jump_table[SCENERY_START].is_enabled());

        road.road_pos = 0x0021 << 16;
        scenery.tick(&mut world, &road, &level, 0);
        assert!(world.jump_table[SCENERY_START].is_enabled());
        assert_eq!(world.jump_table[SCENERY_START].counter, 1);
    }

    #[test]
    fn solid_objects_report_one_hit() {
        let (level, mut road) =
            setup(vec![placement(0x04, 0x30, true), placement(0x04, -0x30, false)]);
        let mut world = SpriteWorld::new(false);
        let mut scenery = Scenery::new();

        assert_eq!(scenery.tick(&mut world, &road, &level, 0), None);

        road.road_pos = 0x0003_C000;
        assert_eq!(scenery.tick(&mut world, &road, &level, 0), Some(0x30));
        assert_eq!(scenery.tick(&mut world, &road, &level, 0), None);

        // Car well clear of the object
        let mut scenery = Scenery::new();
        let mut world = SpriteWorld::new(false);
        assert_eq!(scenery.tick(&mut world, &road, &level, -0x60), None);
    }

    #[test]
    fn far_side_objects_never_hit() {
        let (level, mut road) = setup(vec![placement(0x04, 0x7FF0, true)]);
        let mut world = SpriteWorld::new(false);
        let mut scenery = Scenery::new();
        scenery.tick(&mut world, &road, &level, -0x7FF0);

        road.road_pos = 0x0003_C000;
        assert_eq!(scenery.tick(&mut world, &road, &level, -0x7FF0), None);
        assert_eq!(scenery.tick(&mut world, &road, &level, 0x7FC0), Some(0x7FF0));
    }

    #[test]
    fn reset_clears_slots() {
        let (level, road) = setup(vec![placement(0x02, 0, false)]);
        let mut world = SpriteWorld::new(false);
        let mut scenery = Scenery::new();
        scenery.tick(&mut world, &road, &level, 0);
        assert!(world.jump_table[SCENERY_START].is_enabled());

        scenery.reset(&mut world);
        assert!(!world.jump_table[SCENERY_START].is_enabled());
        assert_eq!(scenery.next_index, 0);
    }
}
