//! Hardware sprite records as written to sprite RAM

use bincode::{Decode, Encode};
use outrun_common::num::{GetBit, U16Ext};

pub const SPRITE_WORDS: usize = 6;

/// One sprite RAM record.
///
/// ```text
/// word 0: E H . b b b b y y y y y y y y y   end, hide, bank, top Y
/// word 1: o o o o o o o o o o o o o o o o   pixel data offset within bank
/// word 2: R B . . . . x x x x x x x x x x   right-to-left scan, backward read, X
/// word 3: p p p p p p p p . . . . . . . .   pitch
/// word 4: S . P P . . z z z z z z z z z z   shadow, tile priority, zoom
/// word 5: h h h h h h h h c c c c c c c c   height, palette
/// ```
///
/// Records earlier in sprite RAM are drawn over later ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
pub struct HwSprite {
    pub data: [u16; SPRITE_WORDS],
}

impl HwSprite {
    #[must_use]
    pub fn end_marker() -> Self {
        let mut sprite = Self::default();
        sprite.data[0] = 0x8000;
        sprite
    }

    pub fn hide(&mut self) {
        self.data[0] = self.data[0].with_bit(14, true);
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.data[0].bit(14)
    }

    pub fn set_y(&mut self, y: i32) {
        self.data[0] = (self.data[0] & !0x01FF) | (y as u16 & 0x01FF);
    }

    #[must_use]
    pub fn y(&self) -> u16 {
        self.data[0].bits(0..=8)
    }

    pub fn set_bank(&mut self, bank: u8) {
        self.data[0] = (self.data[0] & !0x1E00) | ((u16::from(bank) & 0xF) << 9);
    }

    #[must_use]
    pub fn bank(&self) -> u8 {
        self.data[0].bits(9..=12) as u8
    }

    pub fn set_offset(&mut self, offset: u16) {
        self.data[1] = offset;
    }

    pub fn inc_offset(&mut self, amount: u16) {
        self.data[1] = self.data[1].wrapping_add(amount);
    }

    #[must_use]
    pub fn offset(&self) -> u16 {
        self.data[1]
    }

    pub fn set_x(&mut self, x: i32) {
        self.data[2] = (self.data[2] & !0x03FF) | (x as u16 & 0x03FF);
    }

    #[must_use]
    pub fn x(&self) -> u16 {
        self.data[2].bits(0..=9)
    }

    pub fn set_render(&mut self, scan_rtl: bool, read_backward: bool) {
        self.data[2] = self.data[2].with_bit(15, scan_rtl).with_bit(14, read_backward);
    }

    /// (right-to-left scan, backward read)
    #[must_use]
    pub fn render(&self) -> (bool, bool) {
        (self.data[2].bit(15), self.data[2].bit(14))
    }

    pub fn set_pitch(&mut self, pitch: u8) {
        self.data[3].set_msb(pitch);
    }

    #[must_use]
    pub fn pitch(&self) -> u8 {
        self.data[3].msb()
    }

    pub fn set_zoom(&mut self, zoom: u16) {
        self.data[4] = (self.data[4] & !0x03FF) | (zoom & 0x03FF);
    }

    #[must_use]
    pub fn zoom(&self) -> u16 {
        self.data[4].bits(0..=9)
    }

    pub fn set_priority(&mut self, priority: u8) {
        self.data[4] = (self.data[4] & !0x3000) | ((u16::from(priority) & 3) << 12);
    }

    pub fn set_shadow(&mut self, shadow: bool) {
        self.data[4] = self.data[4].with_bit(15, shadow);
    }

    #[must_use]
    pub fn is_shadow(&self) -> bool {
        self.data[4].bit(15)
    }

    pub fn set_pal(&mut self, palette: u8) {
        self.data[5].set_lsb(palette);
    }

    #[must_use]
    pub fn pal(&self) -> u8 {
        self.data[5].lsb()
    }

    pub fn set_height(&mut self, height: u8) {
        self.data[5].set_msb(height);
    }

    #[must_use]
    pub fn height(&self) -> u8 {
        self.data[5].msb()
    }

    /// Trim lines off the bottom of the sprite; trimming all of it hides the sprite.
    pub fn sub_height(&mut self, lines: u16) {
        let height = u16::from(self.height());
        if lines >= height {
            self.set_height(0);
            self.hide();
        } else {
            self.set_height((height - lines) as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn field_packing() {
        let mut sprite = HwSprite::default();
        sprite.set_y(0x1C0);
        sprite.set_bank(0xA);
        sprite.set_x(-2);
        sprite.set_render(true, false);
        sprite.set_pitch(0x12);
        sprite.set_zoom(0x1FC);
        sprite.set_priority(2);
        sprite.set_pal(0x34);
        sprite.set_height(0x56);

        assert_eq!(sprite.data[0], 0x1400 | 0x01C0);
        assert_eq!(sprite.y(), 0x1C0);
        assert_eq!(sprite.bank(), 0xA);
        assert_eq!(sprite.data[2], 0x8000 | 0x03FE);
        assert_eq!(sprite.data[3], 0x1200);
        assert_eq!(sprite.data[4], 0x2000 | 0x01FC);
        assert_eq!(sprite.data[5], 0x5634);
        assert!(!sprite.is_hidden());
    }

    #[test]
    fn sub_height_hides_when_exhausted() {
        let mut sprite = HwSprite::default();
        sprite.set_height(0x20);
        sprite.sub_height(0x08);
        assert_eq!(sprite.height(), 0x18);
        assert!(!sprite.is_hidden());

        sprite.sub_height(0x18);
        assert!(sprite.is_hidden());
    }
}
