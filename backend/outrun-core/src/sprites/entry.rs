//! Software sprite descriptors

use bincode::{Decode, Encode};

// Control flags
pub const ENABLE: u8 = 0x01;
pub const HFLIP: u8 = 0x02;
pub const SHADOW: u8 = 0x04;
pub const TRAFFIC: u8 = 0x08;
/// Set by the compositor when the last conversion produced a visible sprite
pub const DRAW_SPRITE: u8 = 0x10;

// draw_props bits 0-1: horizontal anchor
pub const ANCHOR_LEFT: u8 = 0x00;
pub const ANCHOR_HCENTRE: u8 = 0x01;
pub const ANCHOR_RIGHT: u8 = 0x02;

// draw_props bits 2-3: vertical anchor
pub const ANCHOR_TOP: u8 = 0x00;
pub const ANCHOR_VCENTRE: u8 = 0x04;
pub const ANCHOR_BOTTOM: u8 = 0x08;

/// draw_props bits 6-7 are a signed zoom table selector
pub const ZOOM_SELECT_SHIFT: u8 = 6;

/// Standing on the road: centred horizontally, bottom edge at the projected point
pub const GROUND_PROPS: u8 = ANCHOR_HCENTRE | ANCHOR_BOTTOM;

/// One software sprite.
///
/// Several fields are scratch space whose meaning depends on the slot's role:
///
/// | field     | traffic                        | passenger              | scenery          | crash smoke   |
/// |-----------|--------------------------------|------------------------|------------------|---------------|
/// | `z`       | road lines ahead, 16.16        | flip arc position      | road lines ahead | unused        |
/// | `xw1`     | lane target X                  | X offset from the car  | X off road centre| X drift       |
/// | `xw2`     | current X                      | Y offset from the car  | unused           | Y offset      |
/// | `counter` | lane change cooldown           | animation timer        | placement index  | frame timer   |
/// | `reload`  | lane (bit 7 = right-hand side) | flip sub-state         | collidable flag  | unused        |
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct Entry {
    pub jump_index: u8,
    pub control: u8,
    /// Screen X relative to the middle of the screen
    pub x: i16,
    /// Sprite Y, 0x100 = top of screen
    pub y: i16,
    pub z: u32,
    /// Road line used for clipping against hill crests
    pub road_priority: u16,
    /// Draw order, 0 = front
    pub priority: u16,
    pub zoom: u16,
    pub pal_src: u8,
    pub draw_props: u8,
    /// Frame header address in the sprite ROM
    pub addr: u32,
    /// Sideways shadow offset per road line
    pub shadow: u8,
    pub counter: u16,
    pub reload: u8,
    pub xw1: i16,
    pub xw2: i16,
    pub traffic_speed: u16,
    /// Bit n set when traffic slot n is just ahead in the same lane
    pub traffic_proximity: u8,
}

impl Entry {
    #[must_use]
    pub fn new(jump_index: u8) -> Self {
        Self { jump_index, ..Self::default() }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.control & ENABLE != 0
    }

    pub fn enable(&mut self) {
        self.control |= ENABLE;
    }

    /// Entries are never freed; clearing the enable bit hides them.
    pub fn disable(&mut self) {
        self.control &= !(ENABLE | DRAW_SPRITE);
    }

    pub fn set_hflip(&mut self, hflip: bool) {
        if hflip {
            self.control |= HFLIP;
        } else {
            self.control &= !HFLIP;
        }
    }

    #[must_use]
    pub fn h_anchor(&self) -> u8 {
        self.draw_props & 0x03
    }

    #[must_use]
    pub fn v_anchor(&self) -> u8 {
        self.draw_props & 0x0C
    }
}

/// Advance an entry's distance counter by one displayed frame's share of a per-tick increment.
pub fn move_sprite(entry: &mut Entry, increment: i32, shift: u32) {
    entry.z = entry.z.wrapping_add_signed(increment >> shift);
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn move_sprite_sub_steps() {
        let mut entry = Entry::new(0);
        entry.z = 0x10_0000;

        // 60Hz: two half steps make one full 30Hz step
        move_sprite(&mut entry, -0x8000, 1);
        move_sprite(&mut entry, -0x8000, 1);
        assert_eq!(entry.z, 0x0F_8000);

        for _ in 0..4 {
            move_sprite(&mut entry, 0x1_0000, 2);
        }
        assert_eq!(entry.z, 0x10_8000);
    }
}
