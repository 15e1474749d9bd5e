//! Track data consumed by the engine: ROM images and per-stage level records

use crate::api::{OutRunError, OutRunResult};

/// A read-only big-endian ROM image.
///
/// Reads past the end of the image return 0 rather than failing; track data that runs off the
/// end of a table is treated like open bus.
#[derive(Debug, Clone, Default)]
pub struct Rom {
    data: Box<[u8]>,
}

impl Rom {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data: data.into_boxed_slice() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `len` bytes starting at `address` are all inside the image.
    #[must_use]
    pub fn contains(&self, address: u32, len: u32) -> bool {
        (address as usize).checked_add(len as usize).is_some_and(|end| end <= self.data.len())
    }

    #[must_use]
    pub fn read8(&self, address: u32) -> u8 {
        match self.data.get(address as usize) {
            Some(&byte) => byte,
            None => {
                log::trace!("ROM read past end of image: {address:06X}");
                0
            }
        }
    }

    #[must_use]
    pub fn read16(&self, address: u32) -> u16 {
        u16::from_be_bytes([self.read8(address), self.read8(address.wrapping_add(1))])
    }

    #[must_use]
    pub fn read32(&self, address: u32) -> u32 {
        (u32::from(self.read16(address)) << 16) | u32::from(self.read16(address.wrapping_add(2)))
    }

    pub fn read8_inc(&self, address: &mut u32) -> u8 {
        let value = self.read8(*address);
        *address = address.wrapping_add(1);
        value
    }

    pub fn read16_inc(&self, address: &mut u32) -> u16 {
        let value = self.read16(*address);
        *address = address.wrapping_add(2);
        value
    }

    pub fn read32_inc(&self, address: &mut u32) -> u32 {
        let value = self.read32(*address);
        *address = address.wrapping_add(4);
        value
    }
}

/// Bytes per path entry: signed dx then dy
pub const PATH_ENTRY_LEN: u32 = 2;
/// Bytes per change entry: position, type, pad byte, value
pub const CHANGE_ENTRY_LEN: u32 = 6;
/// Bytes per scenery entry: position, x, frame address, draw props, palette, flags, pad byte
pub const SCENERY_ENTRY_LEN: u32 = 12;
/// Position word that terminates the change and scenery tables
pub const END_OF_TABLE: u16 = 0xFFFF;

const CHANGE_WIDTH: u8 = 0;
const CHANGE_HEIGHT: u8 = 1;

// scenery flags
const SCENERY_COLLIDABLE: u8 = 0x01;
const SCENERY_HFLIP: u8 = 0x02;
const SCENERY_SHADOW: u8 = 0x04;

/// Entry in a level's width/height change table, keyed by coarse road position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadChange {
    /// Move the road generators apart (or back together) to the given half-separation
    Width { position: u16, width: u16 },
    /// Start the given height segment from the height map
    Height { position: u16, segment: u16 },
}

impl RoadChange {
    #[must_use]
    pub fn position(self) -> u16 {
        match self {
            Self::Width { position, .. } | Self::Height { position, .. } => position,
        }
    }

    /// Table encoding of this entry.
    #[must_use]
    pub fn to_bytes(self) -> [u8; CHANGE_ENTRY_LEN as usize] {
        let (position, kind, value) = match self {
            Self::Width { position, width } => (position, CHANGE_WIDTH, width),
            Self::Height { position, segment } => (position, CHANGE_HEIGHT, segment),
        };
        let [p0, p1] = position.to_be_bytes();
        let [v0, v1] = value.to_be_bytes();
        [p0, p1, kind, 0, v0, v1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneryPlacement {
    /// Coarse road position the object stands at
    pub position: u16,
    /// Lateral offset from the road centre
    pub x: i16,
    /// Sprite frame header address in the sprite ROM
    pub frame: u32,
    pub draw_props: u8,
    pub palette: u8,
    pub collidable: bool,
    pub hflip: bool,
    pub shadow: bool,
}

impl SceneryPlacement {
    /// Table encoding of this entry.
    #[must_use]
    pub fn to_bytes(self) -> [u8; SCENERY_ENTRY_LEN as usize] {
        let mut flags = 0;
        if self.collidable {
            flags |= SCENERY_COLLIDABLE;
        }
        if self.hflip {
            flags |= SCENERY_HFLIP;
        }
        if self.shadow {
            flags |= SCENERY_SHADOW;
        }

        let mut bytes = [0; SCENERY_ENTRY_LEN as usize];
        bytes[0..2].copy_from_slice(&self.position.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.x.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.frame.to_be_bytes());
        bytes[8] = self.draw_props;
        bytes[9] = self.palette;
        bytes[10] = flags;
        bytes
    }
}

pub const ROAD_PALETTE_LEN: usize = 8;
pub const LAYER_PALETTE_LEN: usize = 16;

/// Immutable per-stage track data. The path, curve, change and scenery tables are raw
/// big-endian bytes parsed as the road advances.
#[derive(Debug, Clone)]
pub struct Level {
    /// One (dx, dy) heading delta per coarse road position
    pub path: Rom,
    /// Signed road curvature byte per coarse road position; pushes the car outwards and scrolls
    /// the background
    pub curve: Rom,
    /// Width/height changes sorted by position, terminated by [`END_OF_TABLE`]
    pub changes: Rom,
    /// Scenery placements sorted by position, terminated by [`END_OF_TABLE`]
    pub scenery: Rom,
    /// Palettes for road generators 0 and 1
    pub road_palettes: [[u16; ROAD_PALETTE_LEN]; 2],
    pub sky_palette: [u16; LAYER_PALETTE_LEN],
    pub ground_palette: [u16; LAYER_PALETTE_LEN],
    /// Palette index used for the solid fill between the road and the horizon
    pub ground_colour: u8,
    pub horizon_base: i16,
    /// Coarse road position where the stage ends
    pub length: u16,
    /// Left/right route destinations at the end-of-stage road split; `None` for a final stage
    pub next_stages: Option<[u8; 2]>,
}

impl Level {
    #[must_use]
    pub fn path_delta(&self, position: u16) -> (i8, i8) {
        let mut addr = u32::from(position) * PATH_ENTRY_LEN;
        if !self.path.contains(addr, PATH_ENTRY_LEN) {
            return (0, 0);
        }
        let dx = self.path.read8_inc(&mut addr) as i8;
        let dy = self.path.read8_inc(&mut addr) as i8;
        (dx, dy)
    }

    #[must_use]
    pub fn curve_at(&self, position: u16) -> i8 {
        let addr = u32::from(position);
        if !self.curve.contains(addr, 1) {
            return 0;
        }
        self.curve.read8(addr) as i8
    }

    /// Parse the change entry at `address` and advance past it. Returns `None` at the end of
    /// the table; entries of unknown type are skipped.
    pub fn read_change(&self, address: &mut u32) -> Option<RoadChange> {
        loop {
            if !self.changes.contains(*address, CHANGE_ENTRY_LEN) {
                return None;
            }

            let position = self.changes.read16_inc(address);
            if position == END_OF_TABLE {
                return None;
            }
            let kind = self.changes.read8_inc(address);
            *address += 1;
            let value = self.changes.read16_inc(address);

            match kind {
                CHANGE_WIDTH => return Some(RoadChange::Width { position, width: value }),
                CHANGE_HEIGHT => return Some(RoadChange::Height { position, segment: value }),
                _ => log::warn!("Skipping road change of type {kind:02X} at {position:04X}"),
            }
        }
    }

    pub fn road_changes(&self) -> impl Iterator<Item = RoadChange> + '_ {
        let mut address = 0;
        std::iter::from_fn(move || self.read_change(&mut address))
    }

    /// Parse the `index`th scenery placement, or `None` past the end of the table.
    #[must_use]
    pub fn scenery_placement(&self, index: usize) -> Option<SceneryPlacement> {
        let mut addr = u32::try_from(index).ok()?.checked_mul(SCENERY_ENTRY_LEN)?;
        if !self.scenery.contains(addr, SCENERY_ENTRY_LEN) {
            return None;
        }

        let position = self.scenery.read16_inc(&mut addr);
        if position == END_OF_TABLE {
            return None;
        }
        let x = self.scenery.read16_inc(&mut addr) as i16;
        let frame = self.scenery.read32_inc(&mut addr);
        let draw_props = self.scenery.read8_inc(&mut addr);
        let palette = self.scenery.read8_inc(&mut addr);
        let flags = self.scenery.read8_inc(&mut addr);

        Some(SceneryPlacement {
            position,
            x,
            frame,
            draw_props,
            palette,
            collidable: flags & SCENERY_COLLIDABLE != 0,
            hflip: flags & SCENERY_HFLIP != 0,
            shadow: flags & SCENERY_SHADOW != 0,
        })
    }

    #[must_use]
    pub fn has_split(&self) -> bool {
        self.next_stages.is_some()
    }
}

/// Provider of all track data. Implemented by the host's ROM loader.
pub trait TrackData {
    fn level(&self, stage: u8) -> Option<&Level>;

    fn height_map(&self) -> &Rom;

    fn sprite_rom(&self) -> &Rom;

    fn stage_count(&self) -> u8;
}

/// Size of a height segment header: shape, step divisor, up/down multipliers, hold length,
/// entry count.
pub const HEIGHT_SEGMENT_HEADER_LEN: u32 = 10;

/// Look up the address of a height segment from the height map's pointer table.
pub fn height_segment_address(height_map: &Rom, segment: u16) -> OutRunResult<u32> {
    let pointer = u32::from(segment) * 4;
    if !height_map.contains(pointer, 4) {
        return Err(OutRunError::HeightMapMissing(segment));
    }

    let address = height_map.read32(pointer);
    if !height_map.contains(address, HEIGHT_SEGMENT_HEADER_LEN) {
        return Err(OutRunError::HeightMapMissing(segment));
    }

    let count = u32::from(height_map.read8(address + HEIGHT_SEGMENT_HEADER_LEN - 2));
    if !height_map.contains(address + HEIGHT_SEGMENT_HEADER_LEN, count * 2) {
        return Err(OutRunError::HeightMapMissing(segment));
    }

    Ok(address)
}

/// Check that a stage, every stage reachable from it, and every height segment those stages use
/// are present.
pub fn validate_stage<T: TrackData + ?Sized>(track: &T, stage: u8) -> OutRunResult<()> {
    if track.stage_count() == 0 || track.height_map().is_empty() || track.sprite_rom().is_empty() {
        return Err(OutRunError::TrackDataMissing);
    }
    if stage >= track.stage_count() {
        return Err(OutRunError::InvalidStage(stage));
    }

    let mut pending = vec![stage];
    let mut visited = vec![false; usize::from(track.stage_count())];
    while let Some(stage) = pending.pop() {
        let Some(seen) = visited.get_mut(usize::from(stage)) else {
            return Err(OutRunError::LevelNotFound(stage));
        };
        if *seen {
            continue;
        }
        *seen = true;

        let level = track.level(stage).ok_or(OutRunError::LevelNotFound(stage))?;
        for change in level.road_changes() {
            if let RoadChange::Height { segment, .. } = change {
                height_segment_address(track.height_map(), segment)?;
            }
        }

        if let Some(next) = level.next_stages {
            pending.extend(next);
        }
    }

    Ok(())
}
