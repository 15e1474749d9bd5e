//! Per-tick road position, camera and stage progression, including the end-of-stage fork

use crate::ferrari::{Ferrari, ROAD_EDGE};
use crate::road::{Road, RoadCtrl};
use crate::sound::Sound;
use crate::track::Level;
use bincode::{Decode, Encode};
use outrun_common::frontend::SoundQueue;
use outrun_common::num::Fixed16;
use outrun_proc_macros::EnumDisplay;

/// Road positions before the end of a stage at which the fork starts opening
pub const SPLIT_LEAD: u16 = 0x40;
/// Generator half-separation once the fork is fully open
pub const SPLIT_WIDTH: u16 = 0xC0;

const CURVE_PUSH_SHIFT: u32 = 12;
const CAMERA_FOLLOW_SHIFT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay)]
pub enum SplitState {
    /// Waiting for the approach to a fork
    #[default]
    Check,
    Init,
    /// Generators moving apart
    Widen,
    /// Fork fully open, waiting for the end of the stage
    Split,
    Choose,
    NextStage,
    /// Chosen road sliding back to the middle
    Merge,
}

/// Result of one split state function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStep {
    /// Run the next state's function this tick as well
    Continue,
    Stop,
}

struct SplitContext<'a> {
    road: &'a mut Road,
    level: &'a Level,
    car_x: &'a mut i16,
    sound: &'a mut dyn SoundQueue,
}

type SplitFn = fn(&mut InitEngine, &mut SplitContext<'_>) -> SplitStep;

// Indexed by SplitState
const SPLIT_STATES: [SplitFn; 7] = [
    InitEngine::split_check,
    InitEngine::split_init,
    InitEngine::split_widen,
    InitEngine::split_wait,
    InitEngine::split_choose,
    InitEngine::split_next_stage,
    InitEngine::split_merge,
];

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct InitEngine {
    /// Lateral camera position the road and car sprites are drawn relative to
    pub camera_x: i16,
    pub split_state: SplitState,
    /// Fork taken: 0 = left, 1 = right
    pub route: u8,
    /// Stage to load before the next road tick
    pub pending_stage: Option<u8>,
    /// Set once the end of a stage with no fork is reached
    pub stage_complete: bool,
    merge_width: u16,
}

impl InitEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move along the road by one displayed frame's share of the car's speed.
    pub fn advance_position(road: &mut Road, car_increment: u32, shift: u32) {
        road.road_pos = road.road_pos.wrapping_add((car_increment >> 8) >> shift);
        road.pos_fine = (road.road_pos >> 12) as u16;
    }

    /// Logic-tick bookkeeping that runs before the road is regenerated.
    ///
    /// Returns the road edge the car's wheels are tested against.
    pub fn update_road(
        &mut self,
        road: &mut Road,
        level: &Level,
        ferrari: &mut Ferrari,
        crashing: bool,
        sound: &mut dyn SoundQueue,
    ) -> i16 {
        road.pos_fine_diff = road.pos_fine.wrapping_sub(road.pos_fine_old);
        road.pos_fine_old = road.pos_fine;

        if !crashing {
            let push = (i32::from(level.curve_at(road.road_pos.whole()))
                * i32::from(ferrari.speed()))
                >> CURVE_PUSH_SHIFT;
            ferrari.car_x_pos = ferrari.car_x_pos.wrapping_sub(push as i16);
        }

        self.check_road_split(road, level, &mut ferrari.car_x_pos, sound);
        self.check_stage_end(road, level);
        self.follow_camera(ferrari.car_x_pos);

        i16::try_from(road.road_width).map_or(i16::MAX, |width| ROAD_EDGE.saturating_add(width))
    }

    pub fn follow_camera(&mut self, car_x: i16) {
        let delta = (i32::from(car_x) - i32::from(self.camera_x)) >> CAMERA_FOLLOW_SHIFT;
        self.camera_x = self.camera_x.wrapping_add(delta as i16);
    }

    fn check_stage_end(&mut self, road: &Road, level: &Level) {
        if !self.stage_complete && !level.has_split() && road.road_pos.whole() >= level.length {
            log::info!("Reached end of final stage at position {:04X}", road.road_pos.whole());
            self.stage_complete = true;
        }
    }

    /// Step the fork state machine. A state function returning `Continue` hands straight over to
    /// the next state within the same tick.
    pub fn check_road_split(
        &mut self,
        road: &mut Road,
        level: &Level,
        car_x: &mut i16,
        sound: &mut dyn SoundQueue,
    ) {
        let mut ctx = SplitContext { road, level, car_x, sound };
        loop {
            let state = self.split_state;
            let step = SPLIT_STATES[state as usize](self, &mut ctx);
            if self.split_state != state {
                log::debug!("Road split {state} -> {}", self.split_state);
            }
            if step == SplitStep::Stop {
                break;
            }
        }
    }

    fn split_check(&mut self, ctx: &mut SplitContext<'_>) -> SplitStep {
        let position = ctx.road.road_pos.whole();
        if ctx.level.has_split() && position >= ctx.level.length.saturating_sub(SPLIT_LEAD) {
            self.split_state = SplitState::Init;
            return SplitStep::Continue;
        }
        SplitStep::Stop
    }

    fn split_init(&mut self, ctx: &mut SplitContext<'_>) -> SplitStep {
        ctx.road.road_ctrl = RoadCtrl::BothPrio0;
        ctx.road.road_width_target = SPLIT_WIDTH;
        Sound::RoadSplit.queue(ctx.sound);
        self.split_state = SplitState::Widen;
        SplitStep::Stop
    }

    fn split_widen(&mut self, ctx: &mut SplitContext<'_>) -> SplitStep {
        ctx.road.road_width_target = SPLIT_WIDTH;
        if ctx.road.road_width < SPLIT_WIDTH {
            return SplitStep::Stop;
        }
        ctx.road.road_ctrl = RoadCtrl::SplitPrio0;
        self.split_state = SplitState::Split;
        SplitStep::Continue
    }

    fn split_wait(&mut self, ctx: &mut SplitContext<'_>) -> SplitStep {
        if ctx.road.road_pos.whole() < ctx.level.length {
            return SplitStep::Stop;
        }
        self.split_state = SplitState::Choose;
        SplitStep::Continue
    }

    fn split_choose(&mut self, ctx: &mut SplitContext<'_>) -> SplitStep {
        // Road 1 is the left fork
        self.route = u8::from(*ctx.car_x >= 0);
        ctx.road.road_ctrl =
            if self.route == 0 { RoadCtrl::BothPrio1 } else { RoadCtrl::BothPrio0 };
        self.split_state = SplitState::NextStage;
        SplitStep::Continue
    }

    fn split_next_stage(&mut self, ctx: &mut SplitContext<'_>) -> SplitStep {
        let next = ctx.level.next_stages.map(|stages| stages[usize::from(self.route)]);
        log::info!("Took route {} to stage {next:?}", self.route);
        self.pending_stage = next;
        self.merge_width = ctx.road.road_width;
        self.split_state = SplitState::Merge;
        SplitStep::Stop
    }

    fn split_merge(&mut self, ctx: &mut SplitContext<'_>) -> SplitStep {
        ctx.road.road_width_target = 0;

        // Carry the car along with its road as the generators close up
        let shrink = self.merge_width.saturating_sub(ctx.road.road_width) as i16;
        let side = if self.route == 0 { -1 } else { 1 };
        *ctx.car_x = ctx.car_x.wrapping_sub(side * shrink);
        self.merge_width = ctx.road.road_width;

        if ctx.road.road_width == 0 {
            ctx.road.road_ctrl = RoadCtrl::Road0;
            self.split_state = SplitState::Check;
        }
        SplitStep::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::{self, RecordingSink};
    use outrun_config::BugMode;
    use test_log::test;

    fn fork_level(length: u16) -> Level {
        Level { next_stages: Some([3, 4]), ..testdata::straight_level(length) }
    }

    /// Run the fork logic and the road width update until the state changes or `limit` ticks
    /// pass.
    fn run_until(
        engine: &mut InitEngine,
        road: &mut Road,
        level: &Level,
        car_x: &mut i16,
        sound: &mut RecordingSink,
        state: SplitState,
        limit: usize,
    ) -> usize {
        let height_map = testdata::height_map(&[]);
        for tick in 0..limit {
            if engine.split_state == state {
                return tick;
            }
            engine.check_road_split(road, level, car_x, sound);
            road.tick(level, &height_map, 0, BugMode::Original);
        }
        panic!("split state stuck at {}", engine.split_state);
    }

    #[test]
    fn position_advance_is_sub_stepped() {
        let mut road = Road::new();
        InitEngine::advance_position(&mut road, 0x0100_0000, 0);
        assert_eq!(road.road_pos, 0x0001_0000);
        assert_eq!(road.pos_fine, 0x10);

        let mut stepped = Road::new();
        for _ in 0..4 {
            InitEngine::advance_position(&mut stepped, 0x0100_0000, 2);
        }
        assert_eq!(stepped.road_pos, road.road_pos);
    }

    #[test]
    fn pos_fine_diff_per_tick() {
        let level = testdata::straight_level(0x100);
        let mut road = Road::new();
        let mut engine = InitEngine::new();
        let mut ferrari = Ferrari::new();
        let mut sound = RecordingSink::default();

        InitEngine::advance_position(&mut road, 0x0080_0000, 0);
        engine.update_road(&mut road, &level, &mut ferrari, false, &mut sound);
        assert_eq!(road.pos_fine_diff, 8);
        engine.update_road(&mut road, &level, &mut ferrari, false, &mut sound);
        assert_eq!(road.pos_fine_diff, 0);
    }

    #[test]
    fn curve_pushes_car_outwards() {
        let mut level = testdata::straight_level(0x100);
        level.curve = testdata::curve_table(&[0x40; 0x100]);
        let mut road = Road::new();
        let mut engine = InitEngine::new();
        let mut ferrari = Ferrari::new();
        ferrari.car_increment = 0x0100_0000;
        let mut sound = RecordingSink::default();

        let edge = engine.update_road(&mut road, &level, &mut ferrari, false, &mut sound);
        assert_eq!(ferrari.car_x_pos, -4);
        assert_eq!(edge, ROAD_EDGE);

        // Crash logic owns the car
        engine.update_road(&mut road, &level, &mut ferrari, true, &mut sound);
        assert_eq!(ferrari.car_x_pos, -4);
    }

    #[test]
    fn road_edge_saturates_on_wide_roads() {
        let level = testdata::straight_level(0x100);
        let mut road = Road::new();
        let mut engine = InitEngine::new();
        let mut ferrari = Ferrari::new();
        let mut sound = RecordingSink::default();

        road.road_width = 0x10;
        let edge = engine.update_road(&mut road, &level, &mut ferrari, false, &mut sound);
        assert_eq!(edge, ROAD_EDGE + 0x10);

        road.road_width = 0x7FF0;
        let edge = engine.update_road(&mut road, &level, &mut ferrari, false, &mut sound);
        assert_eq!(edge, i16::MAX);

        road.road_width = u16::MAX;
        let edge = engine.update_road(&mut road, &level, &mut ferrari, false, &mut sound);
        assert_eq!(edge, i16::MAX);
    }

    #[test]
    fn camera_eases_towards_car() {
        let mut engine = InitEngine::new();
        engine.follow_camera(0x40);
        assert_eq!(engine.camera_x, 0x10);
        engine.follow_camera(0x40);
        assert_eq!(engine.camera_x, 0x1C);
        for _ in 0..32 {
            engine.follow_camera(0x40);
        }
        assert_eq!(engine.camera_x, 0x3D);
    }

    #[test]
    fn final_stage_completes_once() {
        let level = testdata::straight_level(0x20);
        let mut road = Road::new();
        road.road_pos = 0x20 << 16;
        let mut engine = InitEngine::new();
        let mut ferrari = Ferrari::new();
        let mut sound = RecordingSink::default();

        engine.update_road(&mut road, &level, &mut ferrari, false, &mut sound);
        assert!(engine.stage_complete);
        assert_eq!(engine.split_state, SplitState::Check);
        assert_eq!(engine.pending_stage, None);
    }

    #[test]
    fn fork_opens_chooses_and_merges() {
        let level = fork_level(0x100);
        let mut road = Road::new();
        road.load_level(&level, &mut RecordingSink::default());
        let mut engine = InitEngine::new();
        let mut sound = RecordingSink::default();
        let mut car_x = 0x80;

        // Too early
        road.road_pos = (0x100 - u32::from(SPLIT_LEAD) - 1) << 16;
        engine.check_road_split(&mut road, &level, &mut car_x, &mut sound);
        assert_eq!(engine.split_state, SplitState::Check);

        // Check hands straight over to Init in the same tick
        road.road_pos = (0x100 - u32::from(SPLIT_LEAD)) << 16;
        engine.check_road_split(&mut road, &level, &mut car_x, &mut sound);
        assert_eq!(engine.split_state, SplitState::Widen);
        assert_eq!(road.road_ctrl, RoadCtrl::BothPrio0);
        assert_eq!(sound.sounds, vec![Sound::RoadSplit as u8]);

        run_until(&mut engine, &mut road, &level, &mut car_x, &mut sound, SplitState::Split, 0x40);
        assert_eq!(road.road_ctrl, RoadCtrl::SplitPrio0);
        assert_eq!(road.road_width, SPLIT_WIDTH);

        // Car on the right fork at the end of the stage
        road.road_pos = 0x100 << 16;
        engine.check_road_split(&mut road, &level, &mut car_x, &mut sound);
        assert_eq!(engine.split_state, SplitState::Merge);
        assert_eq!(engine.route, 1);
        assert_eq!(engine.pending_stage, Some(4));
        assert_eq!(road.road_ctrl, RoadCtrl::BothPrio0);

        run_until(&mut engine, &mut road, &level, &mut car_x, &mut sound, SplitState::Check, 0x40);
        assert_eq!(road.road_ctrl, RoadCtrl::Road0);
        assert_eq!(road.road_width, 0);
        // Slid in with the right-hand road
        assert_eq!(car_x, 0x80 - SPLIT_WIDTH as i16);
    }

    #[test]
    fn left_fork_takes_first_route() {
        let level = fork_level(0x40);
        let mut road = Road::new();
        road.road_pos = 0x40 << 16;
        let mut engine = InitEngine { split_state: SplitState::Split, ..InitEngine::new() };
        let mut sound = RecordingSink::default();
        let mut car_x = -0x90;

        engine.check_road_split(&mut road, &level, &mut car_x, &mut sound);
        assert_eq!(engine.route, 0);
        assert_eq!(engine.pending_stage, Some(3));
        assert_eq!(road.road_ctrl, RoadCtrl::BothPrio1);
    }
}
