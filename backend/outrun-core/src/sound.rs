//! Sound command identifiers queued by the game logic

use outrun_common::frontend::SoundQueue;
use outrun_proc_macros::EnumDisplay;

/// Commands understood by the sound board. Values are the bytes written to the sound latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumDisplay)]
#[repr(u8)]
pub enum Sound {
    Bump = 0x8B,
    Crash = 0x8C,
    Screech = 0x8F,
    TyreSquealStop = 0x90,
    OffRoad = 0x92,
    GearShift = 0x93,
    TrafficHorn = 0x97,
    WheelSpin = 0x99,
    PassengerScream = 0x9A,
    RoadSplit = 0x9C,
}

impl Sound {
    pub fn queue(self, queue: &mut dyn SoundQueue) {
        log::trace!("Queued sound {self} ({:02X})", self as u8);
        queue.queue_sound(self as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::RecordingSink;
    use test_log::test;

    #[test]
    fn queues_latch_byte() {
        let mut sink = RecordingSink::default();
        Sound::Crash.queue(&mut sink);
        Sound::RoadSplit.queue(&mut sink);
        assert_eq!(sink.sounds, vec![0x8C, 0x9C]);
    }
}
