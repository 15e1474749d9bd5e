//! Engine lookup tables

/// Rev change per tick. Entries 0x00-0x7F are used while revs rise and 0x80-0xFF while they fall,
/// each indexed by half the integer revs. Falling revs drop away at half the rate they build.
pub const REV_INC_LOOKUP: [u8; 256] = [
    0x14, 0x14, 0x14, 0x13, 0x13, 0x13, 0x13, 0x12, 0x12, 0x12, 0x12, 0x11, 0x11, 0x11, 0x11, 0x11,
    0x10, 0x10, 0x10, 0x10, 0x0F, 0x0F, 0x0F, 0x0F, 0x0F, 0x0E, 0x0E, 0x0E, 0x0E, 0x0E, 0x0D, 0x0D,
    0x0D, 0x0D, 0x0D, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x0B, 0x0B, 0x0B, 0x0B, 0x0B, 0x0A, 0x0A, 0x0A,
    0x0A, 0x0A, 0x0A, 0x09, 0x09, 0x09, 0x09, 0x09, 0x09, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x07,
    0x07, 0x07, 0x07, 0x07, 0x07, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x05, 0x05, 0x05, 0x05,
    0x05, 0x05, 0x05, 0x05, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x03, 0x03, 0x03, 0x03,
    0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02,
    0x02, 0x02, 0x02, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
    0x0A, 0x0A, 0x0A, 0x09, 0x09, 0x09, 0x09, 0x09, 0x09, 0x09, 0x09, 0x08, 0x08, 0x08, 0x08, 0x08,
    0x08, 0x08, 0x08, 0x08, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x07, 0x06, 0x06,
    0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x06, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05, 0x05,
    0x05, 0x05, 0x05, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x03,
    0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x02, 0x02, 0x02, 0x02,
    0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x01, 0x01, 0x01, 0x01,
    0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
    0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
];

/// First `REV_INC_LOOKUP` entry used while revs fall
pub const REV_FALL_START: usize = 0x80;

/// Rev divisor per torque index.
///
/// 0x00-0x07: start line, 0x08-0x0F: low gear, 0x10-0x1F: high gear.
pub const TORQUE_LOOKUP: [u16; 32] = [
    0x3C00, 0x3A00, 0x3800, 0x3600, 0x3400, 0x3200, 0x3000, 0x2E00,
    0x2D40, 0x2D1C, 0x2CF7, 0x2CD3, 0x2CAE, 0x2C8A, 0x2C65, 0x2C40,
    0x2B00, 0x2A0D, 0x291A, 0x2826, 0x2733, 0x2640, 0x254D, 0x245A,
    0x2366, 0x2273, 0x2180, 0x208D, 0x1F9A, 0x1EA6, 0x1DB3, 0x1CC0,
];

pub const TORQUE_LOW_GEAR: u8 = 0x0F;
pub const TORQUE_HIGH_GEAR: u8 = 0x1F;

/// Brake pedal thresholds, each crossing selects the next `BRAKE_SUBTRACT` tier
pub const BRAKE_THRESHOLDS: [u8; 4] = [0x40, 0x70, 0xA0, 0xD0];
pub const BRAKE_SUBTRACT: [i32; 5] = [0, 0x8000, 0x14000, 0x1E000, 0x28000];

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn rev_increment_shape() {
        assert_eq!(REV_INC_LOOKUP[0], 0x14);
        assert_eq!(REV_INC_LOOKUP[0x40], 0x07);
        assert_eq!(REV_INC_LOOKUP[0x80], 0x0A);
        assert_eq!(REV_INC_LOOKUP[255], 0x01);

        let (rising, falling) = REV_INC_LOOKUP.split_at(REV_FALL_START);
        assert!(rising.windows(2).all(|pair| pair[1] <= pair[0]));
        assert!(falling.windows(2).all(|pair| pair[1] <= pair[0]));
        assert!(rising.iter().zip(falling).all(|(&up, &down)| up >= down));
    }

    #[test]
    fn torque_bands() {
        assert_eq!(TORQUE_LOOKUP[0], 0x3C00);
        assert_eq!(TORQUE_LOOKUP[usize::from(TORQUE_LOW_GEAR)], 0x2C40);
        assert_eq!(TORQUE_LOOKUP[usize::from(TORQUE_HIGH_GEAR)], 0x1CC0);
        assert!(TORQUE_LOOKUP.windows(2).all(|pair| pair[1] < pair[0]));
    }
}
