//! Vertical road geometry: the height segment state machine and per-line elevation

use crate::road::ROAD_LINES;
use crate::track::{self, HEIGHT_SEGMENT_HEADER_LEN, Rom};
use bincode::{Decode, Encode};
use outrun_common::boxedarray::BoxedSignedWordArray;
use outrun_config::BugMode;
use outrun_proc_macros::EnumDisplay;

/// Interpolated sub-sections written per height entry
const SUBSECTIONS: i32 = 7;
const LINES_PER_SUBSECTION: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay)]
pub enum HeightCtrl {
    /// No segment active; the road is flat
    #[default]
    Idle,
    /// Read the queued segment's header
    Load,
    /// Walk through the height entries
    Advance,
    /// Freeze on the current entry
    Hold,
    /// Move the horizon only
    Horizon,
    /// Segment finished
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay)]
pub enum HeightShape {
    /// Walk every entry once
    #[default]
    Normal,
    /// Hold halfway through the segment, then carry on
    DelayedHold,
    /// Walk to the last entry and hold there
    LookaheadHold,
    /// Entries ignored; shift the horizon towards the segment's target
    HorizonOnly,
}

impl HeightShape {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Normal,
            1 => Self::DelayedHold,
            2 => Self::LookaheadHold,
            3 => Self::HorizonOnly,
            _ => {
                log::warn!("Unknown height segment shape {byte}, treating as normal");
                Self::Normal
            }
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct HeightState {
    pub height_ctrl: HeightCtrl,
    pending: Option<u16>,
    segment: u16,
    entries_addr: u32,
    shape: HeightShape,
    step_adjust: u16,
    up_mult: u16,
    down_mult: u16,
    /// Hold duration, or horizon target for horizon-only segments
    hold_length: u16,
    count: u8,
    index: u8,
    /// Progress from the current entry to the next, 8.8
    pub height_step: u32,
    hold: u16,
    held: bool,
    pub horizon_mod: i16,
    /// Elevation of each road line relative to the player, 0x100 = camera height
    pub elevation: BoxedSignedWordArray<ROAD_LINES>,
}

impl Default for HeightState {
    fn default() -> Self {
        Self::new()
    }
}

impl HeightState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            height_ctrl: HeightCtrl::default(),
            pending: None,
            segment: 0,
            entries_addr: 0,
            shape: HeightShape::default(),
            step_adjust: 1,
            up_mult: 0x100,
            down_mult: 0x100,
            hold_length: 0,
            count: 0,
            index: 0,
            height_step: 0,
            hold: 0,
            held: false,
            horizon_mod: 0,
            elevation: BoxedSignedWordArray::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Queue a segment to start once the current one has finished.
    pub fn queue_segment(&mut self, segment: u16) {
        if let Some(dropped) = self.pending.replace(segment) {
            log::warn!("Height segment {dropped} replaced by {segment} before it started");
        }
    }

    #[must_use]
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Run the state machine for one tick and regenerate the elevation table.
    pub fn update(&mut self, height_map: &Rom, pos_fine_diff: u16, bug_mode: BugMode) {
        loop {
            match self.height_ctrl {
                HeightCtrl::Idle => {
                    if self.pending.is_none() {
                        break;
                    }
                    self.height_ctrl = HeightCtrl::Load;
                }
                HeightCtrl::Load => self.load(height_map),
                HeightCtrl::Advance => {
                    self.advance(height_map, pos_fine_diff);
                    break;
                }
                HeightCtrl::Hold => {
                    self.hold(pos_fine_diff, bug_mode);
                    break;
                }
                HeightCtrl::Horizon => {
                    self.move_horizon(pos_fine_diff);
                    break;
                }
                HeightCtrl::End => {
                    log::debug!("Height segment {} finished", self.segment);
                    self.count = 0;
                    self.index = 0;
                    self.height_step = 0;
                    self.height_ctrl = HeightCtrl::Idle;
                    if self.pending.is_none() {
                        break;
                    }
                }
            }
        }

        self.fill_elevation(height_map);
        self.aspect_correct();
    }

    fn load(&mut self, height_map: &Rom) {
        let Some(segment) = self.pending.take() else {
            self.height_ctrl = HeightCtrl::Idle;
            return;
        };

        let Ok(base) = track::height_segment_address(height_map, segment) else {
            // Validated at stage init; a bad pointer here leaves the road flat
            log::warn!("Height segment {segment} missing from height map");
            self.height_ctrl = HeightCtrl::Idle;
            return;
        };

        let mut addr = base;
        self.segment = segment;
        self.shape = HeightShape::from_byte(height_map.read8_inc(&mut addr));
        self.step_adjust = u16::from(height_map.read8_inc(&mut addr)).max(1);
        self.up_mult = height_map.read16_inc(&mut addr);
        self.down_mult = height_map.read16_inc(&mut addr);
        self.hold_length = height_map.read16_inc(&mut addr);
        self.count = height_map.read8(addr);
        self.entries_addr = base + HEIGHT_SEGMENT_HEADER_LEN;

        self.index = 0;
        self.height_step = 0;
        self.held = false;
        self.height_ctrl = match self.shape {
            HeightShape::HorizonOnly => HeightCtrl::Horizon,
            _ => HeightCtrl::Advance,
        };

        log::debug!(
            "Loaded height segment {segment}: {} with {} entries, step {:X} up {:04X} down {:04X}",
            self.shape,
            self.count,
            self.step_adjust,
            self.up_mult,
            self.down_mult
        );
    }

    fn entry(&self, height_map: &Rom, index: u32) -> i32 {
        if self.count == 0 {
            return 0;
        }
        let index = index.min(u32::from(self.count) - 1);
        i32::from(height_map.read16(self.entries_addr + index * 2) as i16)
    }

    fn advance(&mut self, height_map: &Rom, pos_fine_diff: u16) {
        let index = u32::from(self.index);
        let rising = self.entry(height_map, index + 1) >= self.entry(height_map, index);
        let mult = if rising { self.up_mult } else { self.down_mult };

        let step = u32::from(pos_fine_diff) * 12 / u32::from(self.step_adjust);
        self.height_step += (step * u32::from(mult)) >> 8;

        let last = self.count.saturating_sub(1);
        while self.height_step >= 0x100 {
            self.height_step -= 0x100;
            self.index = self.index.saturating_add(1);

            if self.shape == HeightShape::DelayedHold && !self.held && self.index >= last / 2 {
                self.start_hold();
                return;
            }

            if self.index >= last {
                self.index = last;
                if self.shape == HeightShape::LookaheadHold && !self.held {
                    self.start_hold();
                } else {
                    self.height_ctrl = HeightCtrl::End;
                }
                return;
            }
        }
    }

    fn start_hold(&mut self) {
        self.held = true;
        self.hold = self.hold_length;
        self.height_step = 0;
        self.height_ctrl = HeightCtrl::Hold;
    }

    fn hold(&mut self, pos_fine_diff: u16, bug_mode: BugMode) {
        // Arcade behaviour counts the hold in ticks, so it covers more road the faster the car goes
        let elapsed = match bug_mode {
            BugMode::Original => 1,
            BugMode::Patched => pos_fine_diff,
        };
        self.hold = self.hold.saturating_sub(elapsed);

        if self.hold == 0 {
            self.height_ctrl = match self.shape {
                HeightShape::DelayedHold => HeightCtrl::Advance,
                _ => HeightCtrl::End,
            };
        }
    }

    fn move_horizon(&mut self, pos_fine_diff: u16) {
        let target = self.hold_length as i16;
        let step = ((pos_fine_diff >> 2) as i16).max(1);

        let delta = target.wrapping_sub(self.horizon_mod);
        if delta.abs() <= step {
            self.horizon_mod = target;
            self.height_ctrl = HeightCtrl::End;
        } else {
            self.horizon_mod += step * delta.signum();
        }
    }

    fn fill_elevation(&mut self, height_map: &Rom) {
        if !matches!(self.height_ctrl, HeightCtrl::Advance | HeightCtrl::Hold) {
            self.elevation.fill(0);
            return;
        }

        let index = u32::from(self.index);
        let current = self.entry(height_map, index);
        let next = self.entry(height_map, index + 1);
        let player_height = current + (((next - current) * self.height_step as i32) >> 8);

        // Partially completed sub-sections of the current entry are skipped
        let mut skip = ((self.height_step as i32 * SUBSECTIONS) >> 8) as usize;

        let mut total_height = current << 8;
        let mut line = 0;
        let mut j = index;
        'fill: loop {
            let rise = self.entry(height_map, j + 1) - self.entry(height_map, j);
            let slope = (rise << 8) / SUBSECTIONS;
            for _ in 0..SUBSECTIONS {
                total_height += slope;
                if skip != 0 {
                    skip -= 1;
                    continue;
                }

                let relative = ((total_height >> 8) - player_height) as i16;
                for _ in 0..LINES_PER_SUBSECTION {
                    if line == ROAD_LINES {
                        break 'fill;
                    }
                    self.elevation[line] = relative;
                    line += 1;
                }
            }
            j += 1;
        }
    }

    /// Smooth inclines with a 1-2-1 window over groups of lines.
    fn aspect_correct(&mut self) {
        const GROUPS: usize = ROAD_LINES / LINES_PER_SUBSECTION;

        let mut groups = [0_i32; GROUPS];
        for (k, group) in groups.iter_mut().enumerate() {
            *group = i32::from(self.elevation[k * LINES_PER_SUBSECTION]);
        }

        for k in 0..GROUPS {
            let prev = groups[k.saturating_sub(1)];
            let next = groups[(k + 1).min(GROUPS - 1)];
            let smoothed = ((prev + 2 * groups[k] + next) >> 2) as i16;

            let start = k * LINES_PER_SUBSECTION;
            self.elevation[start..start + LINES_PER_SUBSECTION].fill(smoothed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;
    use test_log::test;

    fn segment_rom(shape: u8, hold: u16, entries: &[i16]) -> Rom {
        testdata::height_map(&[testdata::HeightSegment {
            shape,
            step_adjust: 4,
            up_mult: 0x100,
            down_mult: 0x80,
            hold,
            entries: entries.to_vec(),
        }])
    }

    fn run(state: &mut HeightState, rom: &Rom, ticks: usize, diff: u16, bug_mode: BugMode) {
        for _ in 0..ticks {
            state.update(rom, diff, bug_mode);
        }
    }

    #[test]
    fn idle_is_flat() {
        let rom = segment_rom(0, 0, &[0, 0x40]);
        let mut state = HeightState::new();
        state.update(&rom, 0x10, BugMode::Original);
        assert_eq!(state.height_ctrl, HeightCtrl::Idle);
        assert!(state.elevation.iter().all(|&e| e == 0));
    }

    #[test]
    fn hill_ahead_rises() {
        let rom = segment_rom(0, 0, &[0, 0x80, 0x100, 0x80, 0]);
        let mut state = HeightState::new();
        state.queue_segment(0);
        state.update(&rom, 0, BugMode::Original);

        assert_eq!(state.height_ctrl, HeightCtrl::Advance);
        // First two sub-sections are 0x12 and 0x24 before smoothing
        assert_eq!(state.elevation[0], (0x12 + 2 * 0x12 + 0x24) >> 2);
        // Crest two entries ahead
        let crest = state.elevation[2 * 56 - 8];
        assert!(crest > 0xE0, "crest elevation {crest:X}");
        assert!(state.elevation[0x1FF] < crest);
    }

    #[test]
    fn ascent_and_descent_rates_differ() {
        // pos_fine_diff 0x10 -> 0x30 per tick climbing, 0x18 per tick descending
        let rom = segment_rom(0, 0, &[0, 0x40, 0]);
        let mut state = HeightState::new();
        state.queue_segment(0);
        run(&mut state, &rom, 6, 0x10, BugMode::Original);
        assert_eq!(state.index(), 1);
        assert_eq!(state.height_step, 0x20);
        assert_eq!(state.height_ctrl, HeightCtrl::Advance);

        run(&mut state, &rom, 10, 0x10, BugMode::Original);
        assert_eq!(state.height_ctrl, HeightCtrl::End);
        state.update(&rom, 0x10, BugMode::Original);
        assert_eq!(state.height_ctrl, HeightCtrl::Idle);
    }

    #[test]
    fn hold_duration_depends_on_bug_mode() {
        let entries = [0, 0x40, 0x40, 0x40, 0];

        let hold_ticks = |bug_mode| {
            let rom = segment_rom(1, 0x40, &entries);
            let mut state = HeightState::new();
            state.queue_segment(0);
            let mut ticks = 0;
            while state.height_ctrl != HeightCtrl::Hold {
                state.update(&rom, 0x20, bug_mode);
            }
            while state.height_ctrl == HeightCtrl::Hold {
                state.update(&rom, 0x20, bug_mode);
                ticks += 1;
            }
            ticks
        };

        assert_eq!(hold_ticks(BugMode::Original), 0x40);
        assert_eq!(hold_ticks(BugMode::Patched), 2);
    }

    #[test]
    fn horizon_only_moves_horizon() {
        let rom = segment_rom(3, 0x10, &[0x100, 0x100]);
        let mut state = HeightState::new();
        state.queue_segment(0);
        run(&mut state, &rom, 3, 0x10, BugMode::Original);
        assert_eq!(state.horizon_mod, 0x0C);
        assert!(state.elevation.iter().all(|&e| e == 0));

        run(&mut state, &rom, 2, 0x10, BugMode::Original);
        assert_eq!(state.horizon_mod, 0x10);
        assert_eq!(state.height_ctrl, HeightCtrl::Idle);
    }
}
