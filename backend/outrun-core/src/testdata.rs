//! Synthetic track data and recording sinks for unit tests

use crate::sprites::frames;
use crate::track::{
    CHANGE_ENTRY_LEN, END_OF_TABLE, Level, RoadChange, Rom, SCENERY_ENTRY_LEN, SceneryPlacement,
    TrackData,
};
use outrun_common::frontend::{HardwareSink, SoundQueue};
use std::collections::HashMap;

/// Flat, straight stage of `length` road positions with no fork.
pub fn straight_level(length: u16) -> Level {
    let len = usize::from(length);
    Level {
        path: path_table(&vec![(0, 0x40); len]),
        curve: curve_table(&vec![0; len]),
        changes: change_table(&[]),
        scenery: scenery_table(&[]),
        road_palettes: [
            std::array::from_fn(|i| 0x0100 + i as u16),
            std::array::from_fn(|i| 0x0200 + i as u16),
        ],
        sky_palette: std::array::from_fn(|i| 0x0300 + i as u16),
        ground_palette: std::array::from_fn(|i| 0x0400 + i as u16),
        ground_colour: 0x05,
        horizon_base: 0x60,
        length,
        next_stages: None,
    }
}

pub fn path_table(deltas: &[(i8, i8)]) -> Rom {
    Rom::new(deltas.iter().flat_map(|&(dx, dy)| [dx as u8, dy as u8]).collect())
}

pub fn curve_table(curve: &[i8]) -> Rom {
    Rom::new(curve.iter().map(|&c| c as u8).collect())
}

/// Change table with its terminating entry.
pub fn change_table(changes: &[RoadChange]) -> Rom {
    let mut bytes: Vec<u8> = changes.iter().flat_map(|change| change.to_bytes()).collect();
    bytes.extend_from_slice(&END_OF_TABLE.to_be_bytes());
    bytes.resize(bytes.len() + CHANGE_ENTRY_LEN as usize - 2, 0);
    Rom::new(bytes)
}

/// Scenery table with its terminating entry.
pub fn scenery_table(placements: &[SceneryPlacement]) -> Rom {
    let mut bytes: Vec<u8> =
        placements.iter().flat_map(|placement| placement.to_bytes()).collect();
    bytes.extend_from_slice(&END_OF_TABLE.to_be_bytes());
    bytes.resize(bytes.len() + SCENERY_ENTRY_LEN as usize - 2, 0);
    Rom::new(bytes)
}

pub struct HeightSegment {
    pub shape: u8,
    pub step_adjust: u8,
    pub up_mult: u16,
    pub down_mult: u16,
    pub hold: u16,
    pub entries: Vec<i16>,
}

/// Height map holding a pointer table followed by each segment's header and entries.
pub fn height_map(segments: &[HeightSegment]) -> Rom {
    let mut pointers = Vec::new();
    let mut body = Vec::new();
    let table_len = segments.len() * 4;

    for segment in segments {
        pointers.extend_from_slice(&((table_len + body.len()) as u32).to_be_bytes());

        body.push(segment.shape);
        body.push(segment.step_adjust);
        body.extend_from_slice(&segment.up_mult.to_be_bytes());
        body.extend_from_slice(&segment.down_mult.to_be_bytes());
        body.extend_from_slice(&segment.hold.to_be_bytes());
        body.push(segment.entries.len() as u8);
        body.push(0);
        for entry in &segment.entries {
            body.extend_from_slice(&entry.to_be_bytes());
        }
    }

    pointers.extend(body);
    Rom::new(pointers)
}

/// Sprite ROM with a linear zoom table and an identical 32x64 header for every frame.
///
/// Zoom entry `i` has hardware zoom `i` and scale `(i >> 1) + 1`, so the largest zoom draws
/// frames at (almost) full size.
pub fn sprite_rom() -> Rom {
    let mut data = vec![0; frames::FRAMES_END as usize];

    for i in 0..frames::ZOOM_TABLE_ENTRIES {
        let base = (frames::ZOOM_TABLE + i * 4) as usize;
        data[base..base + 2].copy_from_slice(&(i as u16).to_be_bytes());
        data[base + 2..base + 4].copy_from_slice(&(((i >> 1) + 1) as u16).to_be_bytes());
    }

    let headers =
        (frames::FRAMES_START..frames::FRAMES_END).step_by(frames::FRAME_HEADER_LEN as usize);
    for (slot, addr) in headers.enumerate() {
        let base = addr as usize;
        data[base] = 4;
        data[base + 1] = 0x40;
        data[base + 2] = slot as u8;
        data[base + 4..base + 6].copy_from_slice(&((slot as u16) << 4).to_be_bytes());
    }

    Rom::new(data)
}

/// Three stages: stage 0 forks into the final stages 1 and 2.
pub struct TestTrack {
    levels: Vec<Level>,
    height_map: Rom,
    sprite_rom: Rom,
}

impl TestTrack {
    pub fn new() -> Self {
        let mut first = straight_level(0x100);
        first.next_stages = Some([1, 2]);
        first.changes = change_table(&[
            RoadChange::Height { position: 0x10, segment: 0 },
            RoadChange::Width { position: 0x20, width: 0x10 },
            RoadChange::Width { position: 0x60, width: 0 },
        ]);
        let mut curve = vec![0; 0x100];
        curve[0x40..0x60].fill(0x20);
        first.curve = curve_table(&curve);
        first.scenery = scenery_table(&[SceneryPlacement {
            position: 0x18,
            x: 0x120,
            frame: frames::SHADOW,
            draw_props: 0,
            palette: 0x20,
            collidable: true,
            hflip: false,
            shadow: true,
        }]);

        let mut left = straight_level(0x80);
        left.changes = change_table(&[RoadChange::Height { position: 0x08, segment: 1 }]);
        let right = straight_level(0x80);

        let segments = [
            HeightSegment {
                shape: 0,
                step_adjust: 4,
                up_mult: 0x100,
                down_mult: 0x80,
                hold: 0,
                entries: vec![0, 0x40, 0x80, 0x40, 0],
            },
            HeightSegment {
                shape: 1,
                step_adjust: 2,
                up_mult: 0x80,
                down_mult: 0x80,
                hold: 0x10,
                entries: vec![0, -0x40, 0],
            },
        ];

        Self {
            levels: vec![first, left, right],
            height_map: height_map(&segments),
            sprite_rom: sprite_rom(),
        }
    }

    /// Stage 0 refers to a height segment the height map doesn't contain.
    pub fn with_missing_height_segment() -> Self {
        let mut track = Self::new();
        track.levels[0].changes =
            change_table(&[RoadChange::Height { position: 0x10, segment: 5 }]);
        track
    }

    pub fn empty() -> Self {
        Self {
            levels: Vec::new(),
            height_map: Rom::new(Vec::new()),
            sprite_rom: Rom::new(Vec::new()),
        }
    }
}

impl TrackData for TestTrack {
    fn level(&self, stage: u8) -> Option<&Level> {
        self.levels.get(usize::from(stage))
    }

    fn height_map(&self) -> &Rom {
        &self.height_map
    }

    fn sprite_rom(&self) -> &Rom {
        &self.sprite_rom
    }

    fn stage_count(&self) -> u8 {
        self.levels.len() as u8
    }
}

/// Hardware sink and sound queue that remember the last value written to each address.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub tile: HashMap<u32, u16>,
    pub text: HashMap<u32, u16>,
    pub palette: HashMap<u32, u16>,
    pub sprite: HashMap<u32, u16>,
    pub road: HashMap<u32, u16>,
    pub sounds: Vec<u8>,
}

impl HardwareSink for RecordingSink {
    fn write_tile16(&mut self, address: u32, value: u16) {
        self.tile.insert(address, value);
    }

    fn write_text16(&mut self, address: u32, value: u16) {
        self.text.insert(address, value);
    }

    fn write_pal16(&mut self, address: u32, value: u16) {
        self.palette.insert(address, value);
    }

    fn write_sprite16(&mut self, address: u32, value: u16) {
        self.sprite.insert(address, value);
    }

    fn write_road16(&mut self, address: u32, value: u16) {
        self.road.insert(address, value);
    }
}

impl SoundQueue for RecordingSink {
    fn queue_sound(&mut self, id: u8) {
        self.sounds.push(id);
    }
}
