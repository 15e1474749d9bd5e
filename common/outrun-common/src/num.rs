//! Bit and fixed-point helpers shared by the simulation crates

use std::ops::RangeInclusive;

pub trait GetBit: Copy {
    #[must_use]
    fn bit(self, i: u8) -> bool;

    #[must_use]
    fn bits(self, range: RangeInclusive<u8>) -> Self;

    /// Return `self` with bit `i` set or cleared.
    #[must_use]
    fn with_bit(self, i: u8, value: bool) -> Self;
}

pub trait SignBit: Copy {
    fn sign_bit(self) -> bool;
}

macro_rules! impl_bit_traits {
    ($($t:ty),* $(,)?) => {
        $(
            impl GetBit for $t {
                #[inline]
                fn bit(self, i: u8) -> bool {
                    debug_assert!(i < (<$t>::BITS as u8));
                    self & (1 << i) != 0
                }

                #[inline]
                fn bits(self, range: RangeInclusive<u8>) -> Self {
                    let (start, end) = (*range.start(), *range.end());
                    debug_assert!(end < (<$t>::BITS as u8));

                    let width = end - start + 1;
                    if u32::from(width) == <$t>::BITS {
                        return self;
                    }
                    (self >> start) & ((1 << width) - 1)
                }

                #[inline]
                fn with_bit(self, i: u8, value: bool) -> Self {
                    debug_assert!(i < (<$t>::BITS as u8));
                    if value { self | (1 << i) } else { self & !(1 << i) }
                }
            }

            impl SignBit for $t {
                #[inline]
                fn sign_bit(self) -> bool {
                    self.bit((<$t>::BITS - 1) as u8)
                }
            }
        )*
    };
}

impl_bit_traits!(u8, u16, u32, i8, i16, i32);

pub trait U16Ext {
    fn lsb(self) -> u8;

    fn msb(self) -> u8;

    fn set_lsb(&mut self, value: u8);

    fn set_msb(&mut self, value: u8);
}

impl U16Ext for u16 {
    #[inline(always)]
    fn lsb(self) -> u8 {
        self as u8
    }

    #[inline(always)]
    fn msb(self) -> u8 {
        (self >> 8) as u8
    }

    #[inline(always)]
    fn set_lsb(&mut self, value: u8) {
        *self = (*self & 0xFF00) | u16::from(value);
    }

    #[inline(always)]
    fn set_msb(&mut self, value: u8) {
        *self = (*self & 0x00FF) | (u16::from(value) << 8);
    }
}

/// Word-level access to 16.16 fixed-point longs, mirroring the `swap`/`move.w` idioms of
/// 68000 code.
pub trait Fixed16 {
    /// The integer (high) word.
    fn whole(self) -> u16;

    /// The fractional (low) word.
    fn frac(self) -> u16;

    fn set_whole(&mut self, value: u16);

    fn set_frac(&mut self, value: u16);
}

macro_rules! impl_fixed16 {
    ($t:ty) => {
        impl Fixed16 for $t {
            #[inline(always)]
            fn whole(self) -> u16 {
                (self >> 16) as u16
            }

            #[inline(always)]
            fn frac(self) -> u16 {
                self as u16
            }

            #[inline(always)]
            fn set_whole(&mut self, value: u16) {
                *self = (*self & 0xFFFF) | ((value as $t) << 16);
            }

            #[inline(always)]
            fn set_frac(&mut self, value: u16) {
                *self = (*self & !0xFFFF) | (value as $t);
            }
        }
    };
}

impl_fixed16!(u32);
impl_fixed16!(i32);

/// Sign-extend the low `bits` bits of `value`, as `ext.w`/`ext.l` would for 8/16-bit operands.
#[inline]
#[must_use]
pub const fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_extracts_ranges() {
        assert_eq!(0b1011_0110_u8.bits(1..=3), 0b011);
        assert_eq!(0xABCD_u16.bits(8..=15), 0xAB);
        assert_eq!(0xFFFF_u16.bits(0..=15), 0xFFFF);
        assert!(0x8000_u16.sign_bit());
        assert_eq!(0_u16.with_bit(14, true), 0x4000);
    }

    #[test]
    fn fixed16_words() {
        let mut value = 0x0012_8000_u32;
        assert_eq!(value.whole(), 0x12);
        assert_eq!(value.frac(), 0x8000);
        value.set_whole(0x34);
        assert_eq!(value, 0x0034_8000);
        value.set_frac(0x0001);
        assert_eq!(value, 0x0034_0001);
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x7F, 8), 0x7F);
        assert_eq!(sign_extend(0x8000, 16), -0x8000);
        assert_eq!(sign_extend(0xE, 4), -2);
    }
}
