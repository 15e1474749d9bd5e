//! Traits implemented by the host around the simulation core

use bincode::{Decode, Encode};
use outrun_proc_macros::{EnumAll, EnumDisplay};

/// Write-only view of the arcade board's video hardware: tile/text layers, palette RAM, sprite
/// RAM and the road generator.
///
/// All writes are fire-and-forget; the core never reads back from the sink.
pub trait HardwareSink {
    fn write_tile16(&mut self, address: u32, value: u16);

    fn write_tile32(&mut self, address: u32, value: u32) {
        self.write_tile16(address, (value >> 16) as u16);
        self.write_tile16(address + 2, value as u16);
    }

    fn write_text16(&mut self, address: u32, value: u16);

    fn write_text32(&mut self, address: u32, value: u32) {
        self.write_text16(address, (value >> 16) as u16);
        self.write_text16(address + 2, value as u16);
    }

    fn write_pal16(&mut self, address: u32, value: u16);

    fn write_pal32(&mut self, address: u32, value: u32) {
        self.write_pal16(address, (value >> 16) as u16);
        self.write_pal16(address + 2, value as u16);
    }

    fn write_sprite16(&mut self, address: u32, value: u16);

    fn write_road16(&mut self, address: u32, value: u16);
}

/// Sound command queue. Commands are queued and never waited on.
pub trait SoundQueue {
    fn queue_sound(&mut self, id: u8);
}

/// Sink that discards every write, for hosts that only need the simulation state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl HardwareSink for NullSink {
    fn write_tile16(&mut self, _address: u32, _value: u16) {}

    fn write_text16(&mut self, _address: u32, _value: u16) {}

    fn write_pal16(&mut self, _address: u32, _value: u16) {}

    fn write_sprite16(&mut self, _address: u32, _value: u16) {}

    fn write_road16(&mut self, _address: u32, _value: u16) {}
}

impl SoundQueue for NullSink {
    fn queue_sound(&mut self, _id: u8) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay, EnumAll)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TickEffect {
    /// Only part of a logic tick ran (sub-stepped display frame)
    #[default]
    None,
    /// A full 30Hz logic tick ran and its output was written to the hardware sink
    LogicTicked,
}
