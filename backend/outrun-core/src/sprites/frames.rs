//! Sprite ROM layout: zoom table and frame header addresses

/// 0x80 zoom buckets x 4 selectors, each (u16 hardware zoom, u16 8.8 scale)
pub const ZOOM_TABLE: u32 = 0x0000;
pub const ZOOM_TABLE_ENTRIES: u32 = 0x200;

/// Frame header: u8 pitch (8-pixel units), u8 height, u8 bank, u8 unused, u16 offset, u16 unused
pub const FRAME_HEADER_LEN: u32 = 8;

pub const FERRARI_STRAIGHT: u32 = 0x1000;
/// Turning left; right turns use the same frames mirrored
pub const FERRARI_LEFT: [u32; 2] = [0x1008, 0x1010];
pub const FERRARI_SPIN: [u32; 4] = [0x1018, 0x1020, 0x1028, 0x1030];
pub const FERRARI_FLIP: [u32; 4] = [0x1038, 0x1040, 0x1048, 0x1050];
pub const FERRARI_SHADOW: u32 = 0x1058;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassengerFrames {
    pub sit: u32,
    pub head: [u32; 2],
    pub flip: u32,
    pub sit_up: u32,
}

pub const MAN: PassengerFrames =
    PassengerFrames { sit: 0x1060, head: [0x1068, 0x1070], flip: 0x1078, sit_up: 0x1080 };
pub const WOMAN: PassengerFrames =
    PassengerFrames { sit: 0x1088, head: [0x1090, 0x1098], flip: 0x10A0, sit_up: 0x10A8 };

pub const SMOKE: [u32; 2] = [0x10B0, 0x10B8];
pub const TRAFFIC_MODELS: [u32; 4] = [0x10C0, 0x10C8, 0x10D0, 0x10D8];
/// Canned shadow for traffic, smaller than the generic one
pub const TRAFFIC_SHADOW: u32 = 0x10E0;
pub const SHADOW: u32 = 0x10E8;

pub const FRAMES_START: u32 = FERRARI_STRAIGHT;
pub const FRAMES_END: u32 = 0x10F0;
