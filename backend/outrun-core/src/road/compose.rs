//! Packing road geometry into the road generator's line table, and writing it to the hardware

use crate::road::{PRIORITY_WORDS, ROAD_LINES, RoadCtrl, ScanlineBuffer, VISIBLE_LINES};
use arrayvec::ArrayVec;
use outrun_common::frontend::HardwareSink;

/// Line word flag: fill the line with a solid palette colour instead of road graphics
pub const HW_SOLID_FILL: u16 = 0x8000;
/// Line word flag: nothing drawn by this generator on the line
pub const HW_TRANSPARENT: u16 = 0x4000;
/// Line word flag: this generator wins where both generators draw
pub const HW_PRIORITY: u16 = 0x2000;

pub const ROAD_RAM: u32 = 0x0008_0000;
pub const ROAD0_LINES: u32 = ROAD_RAM;
pub const ROAD1_LINES: u32 = ROAD_RAM + 0x0400;
pub const ROAD0_HSCROLL: u32 = ROAD_RAM + 0x0800;
pub const ROAD1_HSCROLL: u32 = ROAD_RAM + 0x0C00;
pub const ROAD_CTRL_REG: u32 = 0x0009_0000;

const MAX_CRESTS: usize = PRIORITY_WORDS / 2 - 1;

/// Walk the projected source lines from near to far, filling the line table from the bottom
/// of the screen upwards.
///
/// Each screen line gets the index of the source line drawn on it; a source line that covers
/// several screen lines repeats its index. Whenever the road drops out of sight behind a crest,
/// the crest is recorded in the priority list as (source line, screen line of the occluding
/// edge). Lines above the farthest visible road are filled with the ground colour down from the
/// horizon and left transparent above it.
pub fn do_road_data(buffer: &mut ScanlineBuffer, horizon_y: i16, ground_colour: u8) {
    let mut crests: ArrayVec<(u16, u16), MAX_CRESTS> = ArrayVec::new();

    let mut highest = VISIBLE_LINES as i32;
    let mut hidden = false;
    for source in 0..ROAD_LINES {
        let y = i32::from(buffer.source_y[source] >> 4);
        if y < highest {
            let top = y.max(0);
            for line in top..highest {
                buffer.hw_lines[line as usize] = source as u16;
            }
            highest = top;
            hidden = false;

            if top == 0 {
                break;
            }
        } else if y > highest && !hidden && highest != VISIBLE_LINES as i32 {
            hidden = true;
            if crests.try_push((source as u16, highest as u16)).is_err() {
                log::trace!("Road priority list full, dropping crest at line {source:03X}");
            }
        }
    }

    let ground = HW_SOLID_FILL | u16::from(ground_colour);
    for line in 0..highest {
        buffer.hw_lines[line as usize] =
            if line >= i32::from(horizon_y) { ground } else { HW_TRANSPARENT };
    }
    buffer.hw_lines[VISIBLE_LINES..].fill(HW_TRANSPARENT);

    // Farthest crest first, so the first match when scanning by priority is the nearest edge
    // still in front of the sprite
    let mut words = buffer.priority.iter_mut();
    for &(priority, height) in crests.iter().rev() {
        if let (Some(p), Some(h)) = (words.next(), words.next()) {
            *p = priority;
            *h = height;
        }
    }
    for word in words.take(2) {
        *word = 0;
    }
}

/// Write the current line table and scroll values to whichever generators `road_ctrl` enables.
pub fn blit_roads(
    road_ctrl: RoadCtrl,
    buffer: &ScanlineBuffer,
    road0_h: &[i16; ROAD_LINES],
    road1_h: &[i16; ROAD_LINES],
    sink: &mut dyn HardwareSink,
) {
    sink.write_road16(ROAD_CTRL_REG, road_ctrl.register());

    let (road0_on, road1_on) = road_ctrl.generators();
    let (road0_prio, road1_prio) = match road_ctrl.road0_priority() {
        Some(true) => (HW_PRIORITY, 0),
        Some(false) => (0, HW_PRIORITY),
        None => (0, 0),
    };

    for (line, &word) in buffer.hw_lines.iter().enumerate() {
        let offset = (line as u32) * 2;
        let solid_or_clear = word & (HW_SOLID_FILL | HW_TRANSPARENT) != 0;

        let road0 = match (road0_on, solid_or_clear) {
            (false, _) => HW_TRANSPARENT,
            (true, true) => word,
            (true, false) => word | road0_prio,
        };
        let road1 = match (road1_on, solid_or_clear) {
            (false, _) => HW_TRANSPARENT,
            (true, true) => word,
            (true, false) => word | road1_prio,
        };

        sink.write_road16(ROAD0_LINES + offset, road0);
        sink.write_road16(ROAD1_LINES + offset, road1);
        sink.write_road16(ROAD0_HSCROLL + offset, road0_h[line] as u16);
        sink.write_road16(ROAD1_HSCROLL + offset, road1_h[line] as u16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn buffer_from_y(ys: impl Fn(usize) -> i32) -> ScanlineBuffer {
        let mut buffer = ScanlineBuffer::new();
        for (i, y) in buffer.source_y.iter_mut().enumerate() {
            *y = (ys(i) << 4) as i16;
        }
        buffer
    }

    #[test]
    fn flat_road_has_no_crests() {
        // One screen line per source line, horizon at line 0x60
        let mut buffer = buffer_from_y(|i| 0xDF - (i as i32).min(0x7F));
        do_road_data(&mut buffer, 0x60, 0x12);

        assert_eq!(buffer.hw_lines[0xDF], 0);
        assert_eq!(buffer.hw_lines[0x61], 0x7E);
        assert_eq!(buffer.hw_lines[0x60], 0x7F);
        assert_eq!(buffer.hw_lines[0x5F], HW_TRANSPARENT);
        assert_eq!(buffer.hw_lines[0x1FF], HW_TRANSPARENT);
        assert_eq!(buffer.priority_entries().count(), 0);
        assert_eq!(&buffer.priority[..2], &[0, 0]);
    }

    #[test]
    fn crest_adds_priority_entry() {
        // Road climbs to line 0x80 at source 0x40, drops behind the crest, and reappears at
        // source 0x60
        let mut buffer = buffer_from_y(|i| match i {
            0..0x40 => 0xC0 - i as i32,
            0x40..0x60 => 0x90,
            _ => (0x80 - (i as i32 - 0x60) / 4).max(0x50),
        });
        do_road_data(&mut buffer, 0x40, 0x12);

        let entries: Vec<_> = buffer.priority_entries().collect();
        assert_eq!(entries, vec![(0x40, 0x81)]);
        assert_eq!(buffer.hw_lines[0x81], 0x3F);
        assert_eq!(buffer.hw_lines[0x80], 0x60);
        // Ground fill between the farthest road and the horizon
        assert_eq!(buffer.hw_lines[0x40], HW_SOLID_FILL | 0x12);
        assert_eq!(buffer.hw_lines[0x3F], HW_TRANSPARENT);
    }
}
