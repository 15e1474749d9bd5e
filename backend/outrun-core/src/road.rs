//! Road geometry: per-line curve and elevation tables, composed each tick into the road
//! generator's line table

pub mod compose;
pub mod curve;
pub mod height;

use crate::road::curve::CurveState;
use crate::road::height::HeightState;
use crate::track::{Level, Rom, RoadChange};
use bincode::{Decode, Encode};
use outrun_common::boxedarray::{BoxedArray, BoxedSignedWordArray, BoxedWordArray};
use outrun_common::frontend::HardwareSink;
use outrun_common::num::Fixed16;
use outrun_config::BugMode;
use outrun_proc_macros::EnumDisplay;

/// Source lines per road table, near (0) to far
pub const ROAD_LINES: usize = 0x200;
pub const VISIBLE_LINES: usize = 224;
pub const PRIORITY_WORDS: usize = 0x100;

/// Sprite Y coordinate of the top screen line
pub const SPRITE_Y_TOP: i32 = 0x100;

const CAMERA_HEIGHT: i32 = 0x100;
const PERSPECTIVE_C: i32 = 0xFE0;
const PERSPECTIVE_D: i32 = 0x20;

/// Per-tick change of the road generators' separation
const WIDTH_STEP: u16 = 4;

pub const PALETTE_RAM: u32 = 0x0012_0000;
pub const PALETTE_ROAD: u32 = PALETTE_RAM + 0x1E00;
pub const PALETTE_SKY: u32 = PALETTE_RAM + 0x1E40;
pub const PALETTE_GROUND: u32 = PALETTE_RAM + 0x1E60;

pub const TILE_HSCROLL: u32 = 0x0010_E000;
pub const TILE_VSCROLL: u32 = 0x0010_E002;

/// Road generator mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay)]
pub enum RoadCtrl {
    Off,
    #[default]
    Road0,
    Road1,
    /// Both generators, road 0 drawn over road 1
    BothPrio0,
    BothPrio1,
    /// Both generators with road 1 mirrored for a fork
    SplitPrio0,
    SplitPrio1,
}

impl RoadCtrl {
    #[must_use]
    pub fn register(self) -> u16 {
        self as u16
    }

    /// Which of (road 0, road 1) are drawn.
    #[must_use]
    pub fn generators(self) -> (bool, bool) {
        match self {
            Self::Off => (false, false),
            Self::Road0 => (true, false),
            Self::Road1 => (false, true),
            Self::BothPrio0 | Self::BothPrio1 | Self::SplitPrio0 | Self::SplitPrio1 => (true, true),
        }
    }

    #[must_use]
    pub fn road0_priority(self) -> Option<bool> {
        match self {
            Self::BothPrio0 | Self::SplitPrio0 => Some(true),
            Self::BothPrio1 | Self::SplitPrio1 => Some(false),
            Self::Off | Self::Road0 | Self::Road1 => None,
        }
    }

    #[must_use]
    pub fn is_split(self) -> bool {
        matches!(self, Self::SplitPrio0 | Self::SplitPrio1)
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ScanlineBuffer {
    /// Screen line of each source line, 12.4
    pub source_y: BoxedSignedWordArray<ROAD_LINES>,
    /// Road generator word for each screen line, top down
    pub hw_lines: BoxedWordArray<ROAD_LINES>,
    /// (priority, height) pairs ending in (0, 0)
    pub priority: BoxedWordArray<PRIORITY_WORDS>,
}

impl Default for ScanlineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanlineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            source_y: BoxedSignedWordArray::new(),
            hw_lines: BoxedWordArray::new(),
            priority: BoxedWordArray::new(),
        }
    }

    pub fn priority_entries(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.priority
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .take_while(|&entry| entry != (0, 0))
    }

    /// Screen line of the crest hiding the bottom of a sprite at `road_priority`, if any.
    #[must_use]
    pub fn clip_height(&self, road_priority: u16) -> Option<u16> {
        self.priority_entries()
            .find(|&(priority, _)| priority <= road_priority)
            .map(|(_, height)| height)
    }
}

/// A world object's position on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub x: i16,
    /// Sprite Y, 0x100 = top of screen
    pub y: i16,
    pub zoom: u16,
    pub road_priority: u16,
}

/// Perspective scale of a road line, 0x1FF at the bottom of the screen.
#[must_use]
pub fn line_scale(line: usize) -> i32 {
    (0x1FF * PERSPECTIVE_D) / (line as i32 + PERSPECTIVE_D)
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Road {
    /// 16.16
    pub road_pos: u32,
    pub pos_fine: u16,
    pub pos_fine_old: u16,
    pub pos_fine_diff: u16,
    pub road_ctrl: RoadCtrl,
    /// Half-separation of the two road generators
    pub road_width: u16,
    pub road_width_target: u16,
    /// Level curvature at the player's position
    pub road_curve: i8,
    pub horizon_base: i16,
    pub horizon_y: i16,
    pub bg_scroll: i16,
    ground_colour: u8,
    /// Next entry of the level's change table
    change_addr: u32,
    car_x: i16,
    buffers: [ScanlineBuffer; 4],
    road_p: [u8; 4],
    /// Unshifted curve offset per line, 10.6
    pub road_x: BoxedArray<i32, ROAD_LINES>,
    pub road0_h: BoxedSignedWordArray<ROAD_LINES>,
    pub road1_h: BoxedSignedWordArray<ROAD_LINES>,
    pub curve: CurveState,
    pub height: HeightState,
}

impl Default for Road {
    fn default() -> Self {
        Self::new()
    }
}

impl Road {
    #[must_use]
    pub fn new() -> Self {
        Self {
            road_pos: 0,
            pos_fine: 0,
            pos_fine_old: 0,
            pos_fine_diff: 0,
            road_ctrl: RoadCtrl::default(),
            road_width: 0,
            road_width_target: 0,
            road_curve: 0,
            horizon_base: 0,
            horizon_y: 0,
            bg_scroll: 0,
            ground_colour: 0,
            change_addr: 0,
            car_x: 0,
            buffers: std::array::from_fn(|_| ScanlineBuffer::new()),
            road_p: [0, 1, 2, 3],
            road_x: BoxedArray::new(),
            road0_h: BoxedSignedWordArray::new(),
            road1_h: BoxedSignedWordArray::new(),
            curve: CurveState::default(),
            height: HeightState::new(),
        }
    }

    /// Start a stage from its first position. Generator separation and mode carry over so a
    /// fork can merge back after the stage changes.
    pub fn load_level(&mut self, level: &Level, sink: &mut dyn HardwareSink) {
        self.road_pos = 0;
        self.pos_fine = 0;
        self.pos_fine_old = 0;
        self.pos_fine_diff = 0;
        self.change_addr = 0;
        self.road_curve = 0;
        self.horizon_base = level.horizon_base;
        self.horizon_y = level.horizon_base;
        self.ground_colour = level.ground_colour;
        self.curve.reset();
        self.height.reset();

        upload_palettes(level, sink);
    }

    /// Continue on a freshly loaded stage with the distance already driven past the end of the
    /// previous one, keeping this tick's `pos_fine_diff` intact.
    pub fn carry_over(&mut self, road_pos: u32, pos_fine_old: u16, previous_length: u16) {
        let offset = u32::from(previous_length) << 16;
        let Some(carried) = road_pos.checked_sub(offset) else {
            return;
        };

        self.road_pos = carried;
        self.pos_fine = (carried >> 12) as u16;
        self.pos_fine_old = pos_fine_old.wrapping_sub((offset >> 12) as u16);
    }

    /// Index of the buffer filled this tick.
    #[must_use]
    pub fn road_p0(&self) -> u8 {
        self.road_p[0]
    }

    #[must_use]
    pub fn current(&self) -> &ScanlineBuffer {
        &self.buffers[usize::from(self.road_p[0])]
    }

    /// p0 <- p1 <- p2 <- p3 <- p0
    pub fn rotate_buffers(&mut self) {
        self.road_p.rotate_left(1);
    }

    /// Rebuild the road for one logic tick: rotate buffers, then regenerate curve, width and
    /// elevation, then compose the line table for the new current buffer.
    pub fn tick(&mut self, level: &Level, height_map: &Rom, car_x: i16, bug_mode: BugMode) {
        self.rotate_buffers();

        let position = self.road_pos.whole();
        self.apply_changes(level, position);
        self.update_width();
        self.car_x = car_x;

        self.road_curve = level.curve_at(position);
        let scroll = (i32::from(self.road_curve) * i32::from(self.pos_fine_diff)) >> 4;
        self.bg_scroll = self.bg_scroll.wrapping_sub(scroll as i16);

        if self.curve.update(level, position) {
            self.curve.fill_road_x(&mut self.road_x);
        }
        self.setup_hscroll();

        self.height.update(height_map, self.pos_fine_diff, bug_mode);
        self.horizon_y = self.horizon_base.wrapping_add(self.height.horizon_mod);

        let buffer = &mut self.buffers[usize::from(self.road_p[0])];
        set_road_y(buffer, &self.height.elevation, self.horizon_y);
        compose::do_road_data(buffer, self.horizon_y, self.ground_colour);
    }

    fn apply_changes(&mut self, level: &Level, position: u16) {
        loop {
            let mut addr = self.change_addr;
            let Some(change) = level.read_change(&mut addr) else {
                break;
            };
            if change.position() > position {
                break;
            }
            self.change_addr = addr;

            match change {
                RoadChange::Width { width, .. } => self.road_width_target = width,
                RoadChange::Height { segment, .. } => self.height.queue_segment(segment),
            }
        }
    }

    fn update_width(&mut self) {
        if self.road_width < self.road_width_target {
            self.road_width = (self.road_width + WIDTH_STEP).min(self.road_width_target);
        } else if self.road_width > self.road_width_target {
            self.road_width =
                self.road_width.saturating_sub(WIDTH_STEP).max(self.road_width_target);
        }
    }

    fn setup_hscroll(&mut self) {
        let split = self.road_ctrl.is_split();
        let car_x = i32::from(self.car_x);
        let width = i32::from(self.road_width);

        for line in 0..ROAD_LINES {
            let scale = line_scale(line);
            let base = self.road_x[line] >> 6;
            let road1_base = if split { -base } else { base };

            self.road0_h[line] = (base + (((width - car_x) * scale) >> 9)) as i16;
            self.road1_h[line] = (road1_base + (((-width - car_x) * scale) >> 9)) as i16;
        }
    }

    /// Screen X of the road centre on a line, relative to the middle of the screen.
    #[must_use]
    pub fn centre_x(&self, line: usize) -> i32 {
        (self.road_x[line] >> 6) - ((i32::from(self.car_x) * line_scale(line)) >> 9)
    }

    /// Project an object `z` (16.16 road lines ahead of the camera) and `x` (offset from the
    /// road centre) through the current road tables.
    #[must_use]
    pub fn project(&self, z: u32, x: i16) -> Option<Projection> {
        let line = (z >> 16) as usize;
        if line >= ROAD_LINES {
            return None;
        }

        let y = i32::from(self.current().source_y[line] >> 4);
        let scale = line_scale(line);
        let screen_x = self.centre_x(line) + ((i32::from(x) * scale) >> 9);

        Some(Projection {
            x: screen_x.clamp(i16::MIN.into(), i16::MAX.into()) as i16,
            y: (y + SPRITE_Y_TOP).clamp(i16::MIN.into(), i16::MAX.into()) as i16,
            zoom: scale as u16,
            road_priority: line as u16,
        })
    }

    pub fn blit(&self, sink: &mut dyn HardwareSink) {
        compose::blit_roads(self.road_ctrl, self.current(), &self.road0_h, &self.road1_h, sink);
        sink.write_tile16(TILE_HSCROLL, self.bg_scroll as u16);
        sink.write_tile16(TILE_VSCROLL, self.horizon_y as u16);
    }
}

/// Project each source line's elevation to a screen line.
fn set_road_y(buffer: &mut ScanlineBuffer, elevation: &[i16; ROAD_LINES], horizon_y: i16) {
    for (line, (y, &elevation)) in buffer.source_y.iter_mut().zip(elevation).enumerate() {
        let camera = CAMERA_HEIGHT - i32::from(elevation);
        let screen =
            i32::from(horizon_y) + ((camera * PERSPECTIVE_C) >> 8) / (line as i32 + PERSPECTIVE_D);
        *y = (screen << 4).clamp(i16::MIN.into(), i16::MAX.into()) as i16;
    }
}

pub fn upload_palettes(level: &Level, sink: &mut dyn HardwareSink) {
    for (generator, palette) in level.road_palettes.iter().enumerate() {
        let base = PALETTE_ROAD + (generator as u32) * 0x20;
        for (i, &colour) in palette.iter().enumerate() {
            sink.write_pal16(base + (i as u32) * 2, colour);
        }
    }

    for (i, &colour) in level.sky_palette.iter().enumerate() {
        sink.write_pal16(PALETTE_SKY + (i as u32) * 2, colour);
    }
    for (i, &colour) in level.ground_palette.iter().enumerate() {
        sink.write_pal16(PALETTE_GROUND + (i as u32) * 2, colour);
    }
}
