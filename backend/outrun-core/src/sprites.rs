//! Sprite compositor: orders the software sprite pool by priority and converts it into
//! hardware sprite records

pub mod entry;
pub mod frames;
pub mod hwsprite;

use crate::road::{Projection, SPRITE_Y_TOP, ScanlineBuffer};
use crate::sprites::entry::{
    ANCHOR_BOTTOM, ANCHOR_HCENTRE, ANCHOR_RIGHT, ANCHOR_VCENTRE, DRAW_SPRITE, Entry, HFLIP,
    SHADOW, TRAFFIC, ZOOM_SELECT_SHIFT,
};
use crate::sprites::hwsprite::HwSprite;
use crate::track::Rom;
use bincode::{Decode, Encode};
use outrun_common::boxedarray::BoxedByteArray;
use outrun_common::frontend::HardwareSink;
use outrun_common::num::sign_extend;

// Jump table roles
pub const FERRARI: usize = 0;
pub const PASSENGER1: usize = 1;
pub const PASSENGER2: usize = 2;
pub const FERRARI_SHADOW: usize = 3;
pub const TRAFFIC_START: usize = 4;
pub const TRAFFIC_SLOTS: usize = 8;
pub const CRASH_START: usize = TRAFFIC_START + TRAFFIC_SLOTS;
pub const CRASH_SLOTS: usize = 4;
pub const SCENERY_START: usize = CRASH_START + CRASH_SLOTS;
pub const SCENERY_SLOTS: usize = 32;
pub const JUMP_ENTRIES: usize = SCENERY_START + SCENERY_SLOTS;

pub const PRIORITIES: usize = 0x200;
const BUCKET_LEN: usize = 0x10;
/// Bucket byte 0 is the count
pub const MAX_PER_PRIORITY: usize = 14;
const ORDER_LEN: usize = PRIORITIES * BUCKET_LEN;

pub const MAX_HW_SPRITES: usize = 128;

pub const SPRITE_RAM: u32 = 0x0013_0000;
const SPRITE_RECORD_LEN: u32 = 0x10;

/// Hardware X of the middle of the screen
pub const SPRITE_X_CENTRE: i32 = 0x160;
const Y_VISIBLE_TOP: i32 = 0x100;
const Y_VISIBLE_BOTTOM: i32 = 0x1DF;
const HALF_WIDTH: i32 = 160;
const HALF_WIDTH_WIDESCREEN: i32 = 199;

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpriteWorld {
    pub jump_table: Vec<Entry>,
    order: BoxedByteArray<ORDER_LEN>,
    hw_sprites: Vec<HwSprite>,
    pub spr_cnt_main: u16,
    pub spr_cnt_shadow: u16,
    widescreen: bool,
}

impl SpriteWorld {
    #[must_use]
    pub fn new(widescreen: bool) -> Self {
        Self {
            jump_table: (0..JUMP_ENTRIES).map(|i| Entry::new(i as u8)).collect(),
            order: BoxedByteArray::new(),
            hw_sprites: Vec::with_capacity(MAX_HW_SPRITES),
            spr_cnt_main: 0,
            spr_cnt_shadow: 0,
            widescreen,
        }
    }

    /// Clear every entry back to its power-on state, keeping role indices.
    pub fn reset(&mut self) {
        for (i, entry) in self.jump_table.iter_mut().enumerate() {
            *entry = Entry::new(i as u8);
        }
        self.order.fill(0);
        self.hw_sprites.clear();
        self.spr_cnt_main = 0;
        self.spr_cnt_shadow = 0;
    }

    #[must_use]
    pub fn hw_sprites(&self) -> &[HwSprite] {
        &self.hw_sprites
    }

    /// Queue an enabled entry for drawing at its priority. Entries past the bucket capacity are
    /// dropped for this tick.
    pub fn do_spr_order_shadows(&mut self, index: usize) -> bool {
        let entry = &self.jump_table[index];
        if !entry.is_enabled() {
            return false;
        }

        let base = usize::from(entry.priority) % PRIORITIES * BUCKET_LEN;
        let count = usize::from(self.order[base]);
        if count >= MAX_PER_PRIORITY {
            log::trace!("Priority {:03X} full, dropping sprite {index}", entry.priority);
            return false;
        }

        self.order[base + 1 + count] = index as u8;
        self.order[base] += 1;
        true
    }

    /// Drain the priority buckets front to back, converting each queued entry (and its shadow)
    /// into hardware records.
    pub fn sprite_copy(&mut self, road: &ScanlineBuffer, rom: &Rom) {
        self.hw_sprites.clear();
        self.spr_cnt_main = 0;
        self.spr_cnt_shadow = 0;

        for priority in 0..PRIORITIES {
            let base = priority * BUCKET_LEN;
            let count = usize::from(self.order[base]);
            for slot in 0..count {
                let index = usize::from(self.order[base + 1 + slot]);
                self.convert(index, road, rom);
            }
            self.order[base] = 0;
        }
    }

    fn convert(&mut self, index: usize, road: &ScanlineBuffer, rom: &Rom) {
        let widescreen = self.widescreen;
        let entry = &mut self.jump_table[index];
        if !entry.is_enabled() {
            return;
        }

        let sprite = do_sprite(entry, road, rom, widescreen);
        push_sprite(&mut self.hw_sprites, sprite);
        self.spr_cnt_main += 1;

        if entry.control & SHADOW != 0 {
            let shadow = do_shadow(entry, road, rom, widescreen);
            push_sprite(&mut self.hw_sprites, shadow);
            self.spr_cnt_shadow += 1;
        }
    }

    pub fn blit(&self, sink: &mut dyn HardwareSink) {
        let end = HwSprite::end_marker();
        for (i, sprite) in self.hw_sprites.iter().chain(std::iter::once(&end)).enumerate() {
            let base = SPRITE_RAM + (i as u32) * SPRITE_RECORD_LEN;
            for (w, &word) in sprite.data.iter().enumerate() {
                sink.write_sprite16(base + (w as u32) * 2, word);
            }
        }
    }
}

fn push_sprite(hw_sprites: &mut Vec<HwSprite>, sprite: HwSprite) {
    if hw_sprites.len() < MAX_HW_SPRITES {
        hw_sprites.push(sprite);
    } else {
        log::trace!("Sprite RAM full, dropping record");
    }
}

/// Convert one entry into a hardware record, updating its `DRAW_SPRITE` flag.
pub fn do_sprite(
    entry: &mut Entry,
    road: &ScanlineBuffer,
    rom: &Rom,
    widescreen: bool,
) -> HwSprite {
    let mut sprite = HwSprite::default();
    entry.control &= !DRAW_SPRITE;

    if entry.zoom == 0 {
        sprite.hide();
        return sprite;
    }

    let mut addr = entry.addr;
    let pitch = rom.read8_inc(&mut addr);
    let src_height = rom.read8_inc(&mut addr);
    let bank = rom.read8_inc(&mut addr);
    addr += 1;
    let offset = rom.read16(addr);

    let selector = sign_extend(u32::from(entry.draw_props >> ZOOM_SELECT_SHIFT), 2);
    let zoom_index = ((i32::from(entry.zoom >> 2) << 2) + selector).max(0) as u32;
    let mut zoom_addr = frames::ZOOM_TABLE + zoom_index * 4;
    let hw_zoom = rom.read16_inc(&mut zoom_addr);
    let scale = u32::from(rom.read16(zoom_addr));

    let width = ((u32::from(pitch) * 8 * scale) >> 8) as i32;
    let height = ((u32::from(src_height) * scale) >> 8) as i32;

    let x = i32::from(entry.x);
    let x1 = match entry.h_anchor() {
        ANCHOR_HCENTRE => x - (width >> 1),
        a if a >= ANCHOR_RIGHT => x - width,
        _ => x,
    };
    let y = i32::from(entry.y);
    let y1 = match entry.v_anchor() {
        ANCHOR_VCENTRE => y - (height >> 1),
        ANCHOR_BOTTOM => y - height,
        _ => y,
    };
    let (x2, y2) = (x1 + width, y1 + height);

    let half_width = if widescreen { HALF_WIDTH_WIDESCREEN } else { HALF_WIDTH };
    if width == 0
        || height == 0
        || y2 < Y_VISIBLE_TOP
        || y1 > Y_VISIBLE_BOTTOM
        || x2 < -half_width
        || x1 >= half_width
    {
        sprite.hide();
        return sprite;
    }

    sprite.set_y(y1);
    sprite.set_bank(bank);
    sprite.set_offset(offset);
    sprite.set_pitch(pitch);
    sprite.set_zoom(hw_zoom);
    sprite.set_pal(entry.pal_src);
    sprite.set_priority((entry.priority >> 7) as u8);
    sprite.set_height(height.min(0xFF) as u8);
    set_hrender(&mut sprite, entry, x1, x2, pitch);
    clip_to_road(&mut sprite, road, entry.road_priority, y2);

    if !sprite.is_hidden() {
        entry.control |= DRAW_SPRITE;
    }
    sprite
}

/// Pick scan and read direction from the anchor and flip bits.
///
/// Right-anchored sprites are drawn right to left from their right edge. The ROM is read
/// backwards when exactly one of right anchor and horizontal flip is set.
pub fn set_hrender(sprite: &mut HwSprite, entry: &Entry, x1: i32, x2: i32, pitch: u8) {
    let anchor_right = entry.h_anchor() >= ANCHOR_RIGHT;
    let hflip = entry.control & HFLIP != 0;

    let scan_rtl = anchor_right;
    let read_backward = anchor_right ^ hflip;

    sprite.set_x(if scan_rtl { x2 } else { x1 } + SPRITE_X_CENTRE);
    if read_backward {
        sprite.inc_offset(u16::from(pitch).wrapping_sub(1));
    }
    sprite.set_render(scan_rtl, read_backward);
}

/// Trim the part of a sprite hidden behind the nearest hill crest in front of it.
pub fn clip_to_road(
    sprite: &mut HwSprite,
    road: &ScanlineBuffer,
    road_priority: u16,
    sprite_y2: i32,
) {
    let Some(height) = road.clip_height(road_priority) else {
        return;
    };

    let road_elevation = SPRITE_Y_TOP + i32::from(height);
    if road_elevation < sprite_y2 {
        sprite.sub_height((sprite_y2 - road_elevation) as u16);
    }
}

/// Convert the shadow of an entry using a stand-in shadow frame, then restore the entry.
fn do_shadow(entry: &mut Entry, road: &ScanlineBuffer, rom: &Rom, widescreen: bool) -> HwSprite {
    let saved = (entry.addr, entry.pal_src, entry.priority, entry.x, entry.control);

    entry.addr = if entry.control & TRAFFIC != 0 { frames::TRAFFIC_SHADOW } else { frames::SHADOW };
    entry.pal_src = 0;
    entry.priority = 0;
    entry.x = entry
        .x
        .wrapping_add(((i32::from(entry.road_priority) * i32::from(entry.shadow)) >> 9) as i16);

    let mut sprite = do_sprite(entry, road, rom, widescreen);
    sprite.set_shadow(true);

    (entry.addr, entry.pal_src, entry.priority, entry.x, entry.control) = saved;
    sprite
}

/// Place an entry on the road and queue it for drawing.
pub fn place_on_road(world: &mut SpriteWorld, index: usize, projection: Projection) {
    let entry = &mut world.jump_table[index];
    entry.x = projection.x;
    entry.y = projection.y;
    entry.zoom = projection.zoom;
    entry.road_priority = projection.road_priority;
    entry.priority = projection.road_priority;
    entry.draw_props = (entry.draw_props & !0x0F) | ANCHOR_HCENTRE | ANCHOR_BOTTOM;
    world.do_spr_order_shadows(index);
}
