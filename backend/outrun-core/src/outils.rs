//! Integer helpers shared by the game logic: square root, packed BCD and the ROM's random number
//! generator

use bincode::{Decode, Encode};

/// Integer square root, rounding down.
///
/// Bit-by-bit restoring method; the result always fits in 16 bits.
#[must_use]
pub fn isqrt(value: u32) -> u16 {
    let mut remainder = value;
    let mut root = 0_u32;
    let mut bit = 1_u32 << 30;

    while bit > value {
        bit >>= 2;
    }

    while bit != 0 {
        if remainder >= root + bit {
            remainder -= root + bit;
            root = (root >> 1) + bit;
        } else {
            root >>= 1;
        }
        bit >>= 2;
    }

    root as u16
}

/// Add two packed 8-digit BCD values, discarding the carry out of the top digit (`abcd` chain).
#[must_use]
pub fn bcd_add(a: u32, b: u32) -> u32 {
    let mut result = 0;
    let mut carry = 0;

    for digit in 0..8 {
        let shift = digit * 4;
        let mut sum = ((a >> shift) & 0xF) + ((b >> shift) & 0xF) + carry;
        carry = u32::from(sum > 9);
        if carry != 0 {
            sum -= 10;
        }
        result |= sum << shift;
    }

    result
}

/// Subtract packed BCD `b` from `a`, wrapping below zero the way `sbcd` does (0 - 1 = 99999999).
#[must_use]
pub fn bcd_sub(a: u32, b: u32) -> u32 {
    let mut result = 0;
    let mut borrow = 0;

    for digit in 0..8 {
        let shift = digit * 4;
        let mut diff = ((a >> shift) & 0xF) as i32 - ((b >> shift) & 0xF) as i32 - borrow;
        borrow = i32::from(diff < 0);
        if borrow != 0 {
            diff += 10;
        }
        result |= (diff as u32) << shift;
    }

    result
}

/// Convert a binary value into packed BCD by accumulating decimal place values.
#[must_use]
pub fn to_bcd(mut value: u32) -> u32 {
    const PLACES: [(u32, u32); 8] = [
        (10_000_000, 0x1000_0000),
        (1_000_000, 0x0100_0000),
        (100_000, 0x0010_0000),
        (10_000, 0x0001_0000),
        (1_000, 0x0000_1000),
        (100, 0x0000_0100),
        (10, 0x0000_0010),
        (1, 0x0000_0001),
    ];

    let mut bcd = 0;
    for (place, bcd_place) in PLACES {
        while value >= place {
            value -= place;
            bcd = bcd_add(bcd, bcd_place);
        }
    }
    bcd
}

const RNG_DEFAULT_SEED: u32 = 0x2A6D365A;

/// The game's pseudo random number generator.
///
/// Multiplies the seed by 45 with shift-and-add, then folds the swapped halves back in. A zero
/// seed is replaced with the power-on value.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    #[must_use]
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    #[must_use]
    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn random(&mut self) -> u16 {
        let mut d0 = if self.seed == 0 { RNG_DEFAULT_SEED } else { self.seed };

        let mut d1 = d0;
        d0 = d0.wrapping_shl(2).wrapping_add(d1);
        d1 = d0;
        d0 = d0.wrapping_shl(3).wrapping_add(d1);
        d1 = d0;
        d0 = d0.rotate_left(16).wrapping_add(d1);

        self.seed = d0;
        d0 as u16
    }
}
