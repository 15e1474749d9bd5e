//! OutRun engine public interface and main loop

use crate::attract::AttractAi;
use crate::crash::Crash;
use crate::ferrari::{Ferrari, FerrariState};
use crate::initengine::InitEngine;
use crate::inputs::Inputs;
use crate::outils::{self, Rng};
use crate::road::Road;
use crate::scenery::Scenery;
use crate::sprites::{FERRARI, FERRARI_SHADOW, PASSENGER1, PASSENGER2, SpriteWorld};
use crate::track::{self, Level, TrackData};
use crate::traffic::Traffic;
use bincode::{Decode, Encode};
use outrun_common::frontend::{HardwareSink, SoundQueue, TickEffect};
use outrun_config::{GearMode, InputMode, OutRunConfig, OutRunInputs};
use outrun_proc_macros::EnumDisplay;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutRunError {
    #[error("Track data is missing or empty")]
    TrackDataMissing,
    #[error("No level data for stage {0}")]
    LevelNotFound(u8),
    #[error("Height map segment {0:04X} is missing or truncated")]
    HeightMapMissing(u16),
    #[error("Engine ticked before a stage was initialized")]
    NotInitialized,
    #[error("Stage {0} is out of range")]
    InvalidStage(u8),
}

pub type OutRunResult<T> = Result<T, OutRunError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay)]
pub enum GameState {
    /// Demo run driven by the autopilot
    #[default]
    Attract,
    /// Start sequence playing; the engine isn't connected yet
    StartLine,
    InGame,
    /// Final stage complete, car coasting to a stop
    Bonus,
}

const RNG_SEED: u32 = 0x2A6D_365B;

/// Impacts with traffic at or above this speed wreck the car instead of spinning it
const TRAFFIC_CRASH_SPEED: u16 = 0xC8;

pub const TEXT_RAM: u32 = 0x0011_0000;
/// Text layer address of the speedometer's hundreds digit
pub const SPEEDO_ADDR: u32 = TEXT_RAM + 0x0D9C;
const DIGIT_TILE_BASE: u16 = 0x8030;

#[derive(Debug, Clone, Encode, Decode)]
struct Simulation {
    state: GameState,
    stage: Option<u8>,
    road: Road,
    sprites: SpriteWorld,
    ferrari: Ferrari,
    crash: Crash,
    traffic: Traffic,
    scenery: Scenery,
    engine: InitEngine,
    inputs: Inputs,
    attract: AttractAi,
    rng: Rng,
    frame_count: u32,
}

impl Simulation {
    fn new(config: &OutRunConfig) -> Self {
        Self {
            state: GameState::default(),
            stage: None,
            road: Road::new(),
            sprites: SpriteWorld::new(config.widescreen),
            ferrari: Ferrari::new(),
            crash: Crash::new(),
            traffic: Traffic::new(config.traffic_max),
            scenery: Scenery::new(),
            engine: InitEngine::new(),
            inputs: Inputs::new(),
            attract: AttractAi::new(),
            rng: Rng::new(RNG_SEED),
            frame_count: 0,
        }
    }

    fn set_game_state(&mut self, state: GameState) {
        if state == self.state {
            return;
        }
        log::debug!("Game state {} -> {state}", self.state);
        self.state = state;
        self.ferrari.ingame_engine = is_ingame(state);

        match state {
            GameState::StartLine => self.ferrari.set_state(FerrariState::Seq1),
            GameState::Bonus => self.ferrari.set_state(FerrariState::EndSeq),
            GameState::Attract | GameState::InGame => {}
        }
    }

    /// Adjust this tick's controls, taken from the autopilot in attract mode.
    fn read_inputs(&mut self, inputs: &OutRunInputs, config: &OutRunConfig, level: &Level) {
        let (raw, config) = if self.state == GameState::Attract {
            let raw =
                self.attract.tick(&self.road, level, &self.ferrari, &self.engine, &mut self.rng);
            let config = OutRunConfig {
                input_mode: InputMode::Analog,
                gear_mode: GearMode::Automatic,
                ..*config
            };
            (raw, config)
        } else {
            (*inputs, *config)
        };

        self.inputs.adjust_inputs(&raw, &config);
        self.inputs.update_gear(&raw, &config, self.ferrari.revs);
    }
}

/// The game logic for one cabinet, driven one displayed frame at a time.
pub struct OutRunEngine<T> {
    track: T,
    config: OutRunConfig,
    sim: Simulation,
}

impl<T: TrackData> OutRunEngine<T> {
    #[must_use]
    pub fn new(track: T, config: OutRunConfig) -> Self {
        let config = config.clamped();
        log::info!("Creating engine with config {config}");

        Self { sim: Simulation::new(&config), track, config }
    }

    /// Load a stage and reset the car and world onto its start.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage, a stage reachable from it, or one of their height segments
    /// is missing from the track data. The engine is left untouched on error.
    pub fn init_stage(&mut self, stage: u8, sink: &mut dyn HardwareSink) -> OutRunResult<()> {
        track::validate_stage(&self.track, stage)?;
        let level = self.track.level(stage).ok_or(OutRunError::LevelNotFound(stage))?;

        let sim = &mut self.sim;
        sim.road = Road::new();
        sim.road.load_level(level, sink);
        sim.sprites.reset();
        sim.traffic.reset(&mut sim.sprites);
        sim.scenery.reset(&mut sim.sprites);
        sim.engine = InitEngine::new();
        sim.crash = Crash::new();
        sim.ferrari = Ferrari::new();
        sim.ferrari.ingame_engine = is_ingame(sim.state);
        if sim.state == GameState::StartLine {
            sim.ferrari.set_state(FerrariState::Seq1);
        }
        sim.stage = Some(stage);

        log::info!("Initialized stage {stage} (length {:04X})", level.length);
        Ok(())
    }

    pub fn set_game_state(&mut self, state: GameState) {
        self.sim.set_game_state(state);
    }

    /// The host's start-line animation has finished; the race begins.
    pub fn signal_anim_seq_complete(&mut self) {
        self.sim.ferrari.signal_anim_seq_complete();
        if self.sim.state == GameState::StartLine {
            self.set_game_state(GameState::InGame);
        }
    }

    /// Run one full 30Hz logic tick, ignoring the configured frame rate.
    ///
    /// # Errors
    ///
    /// Returns [`OutRunError::NotInitialized`] if no stage has been loaded.
    pub fn tick(
        &mut self,
        inputs: &OutRunInputs,
        sink: &mut dyn HardwareSink,
        sound: &mut dyn SoundQueue,
    ) -> OutRunResult<()> {
        self.check_initialized()?;
        self.move_frame(0);
        self.logic(inputs, sink, sound)
    }

    /// Advance one displayed frame. Motion advances every frame; the game logic runs once per
    /// 30Hz tick.
    ///
    /// # Errors
    ///
    /// Returns [`OutRunError::NotInitialized`] if no stage has been loaded.
    pub fn run_frame(
        &mut self,
        inputs: &OutRunInputs,
        sink: &mut dyn HardwareSink,
        sound: &mut dyn SoundQueue,
    ) -> OutRunResult<TickEffect> {
        self.check_initialized()?;

        let frame_rate = self.config.frame_rate;
        self.move_frame(frame_rate.increment_shift());
        self.sim.frame_count = self.sim.frame_count.wrapping_add(1);

        if self.sim.frame_count % frame_rate.substeps() != 0 {
            return Ok(TickEffect::None);
        }

        self.logic(inputs, sink, sound)?;
        Ok(TickEffect::LogicTicked)
    }

    fn check_initialized(&self) -> OutRunResult<()> {
        if self.sim.stage.is_none() {
            return Err(OutRunError::NotInitialized);
        }
        Ok(())
    }

    fn move_frame(&mut self, shift: u32) {
        let sim = &mut self.sim;
        InitEngine::advance_position(&mut sim.road, sim.ferrari.car_increment, shift);
        Traffic::move_traffic(&mut sim.sprites, sim.ferrari.speed(), shift);
    }

    fn logic(
        &mut self,
        inputs: &OutRunInputs,
        sink: &mut dyn HardwareSink,
        sound: &mut dyn SoundQueue,
    ) -> OutRunResult<()> {
        if let Some(next) = self.sim.engine.pending_stage.take() {
            self.load_next_stage(next, sink)?;
        }

        let Self { track, config, sim } = self;
        let stage = sim.stage.ok_or(OutRunError::NotInitialized)?;
        let level = track.level(stage).ok_or(OutRunError::LevelNotFound(stage))?;
        let bug_mode = config.bug_mode;

        sim.read_inputs(inputs, config, level);

        let crashing = sim.crash.is_active();
        let road_edge =
            sim.engine.update_road(&mut sim.road, level, &mut sim.ferrari, crashing, sound);
        if sim.engine.stage_complete && sim.state != GameState::Bonus {
            sim.set_game_state(GameState::Bonus);
        }

        sim.road.tick(level, track.height_map(), sim.engine.camera_x, bug_mode);

        sim.ferrari.tick(&sim.inputs, sim.road.road_curve, road_edge, crashing, sound);
        sim.ferrari.update_sprites(&mut sim.sprites, sim.engine.camera_x, crashing);
        sim.crash.tick(&mut sim.ferrari, &mut sim.sprites, bug_mode, sound);

        if let Some(other_x) =
            sim.traffic.tick(&mut sim.sprites, &sim.road, &sim.ferrari, &mut sim.rng, sound)
        {
            if sim.ferrari.speed() >= TRAFFIC_CRASH_SPEED {
                sim.crash.start_collision(&sim.ferrari, other_x, sound);
            } else {
                sim.crash.start_spin(&sim.ferrari, other_x, sound);
            }
        }

        if let Some(hit_x) =
            sim.scenery.tick(&mut sim.sprites, &sim.road, level, sim.ferrari.car_x_pos)
        {
            sim.crash.start_collision(&sim.ferrari, hit_x, sound);
        }

        for index in [FERRARI, PASSENGER1, PASSENGER2, FERRARI_SHADOW] {
            sim.sprites.do_spr_order_shadows(index);
        }
        sim.sprites.sprite_copy(sim.road.current(), track.sprite_rom());

        sim.road.blit(sink);
        sim.sprites.blit(sink);
        write_speedo(sim.ferrari.speed(), sink);

        Ok(())
    }

    /// Swap in the stage chosen at a fork. The road keeps its width and mode so the merge can
    /// finish on the new stage.
    fn load_next_stage(&mut self, stage: u8, sink: &mut dyn HardwareSink) -> OutRunResult<()> {
        let previous_length =
            self.sim.stage.and_then(|previous| self.track.level(previous)).map_or(0, |l| l.length);
        let level = self.track.level(stage).ok_or(OutRunError::LevelNotFound(stage))?;

        let sim = &mut self.sim;
        let (road_pos, pos_fine_old) = (sim.road.road_pos, sim.road.pos_fine_old);
        sim.road.load_level(level, sink);
        sim.road.carry_over(road_pos, pos_fine_old, previous_length);
        sim.scenery.reset(&mut sim.sprites);
        sim.stage = Some(stage);

        log::info!("Entered stage {stage}");
        Ok(())
    }

    pub fn update_config(&mut self, config: OutRunConfig) {
        self.config = config.clamped();
        self.sim.traffic.traffic_max = self.config.traffic_max;
    }

    #[must_use]
    pub fn config(&self) -> &OutRunConfig {
        &self.config
    }

    #[must_use]
    pub fn track(&self) -> &T {
        &self.track
    }

    #[must_use]
    pub fn game_state(&self) -> GameState {
        self.sim.state
    }

    #[must_use]
    pub fn stage(&self) -> Option<u8> {
        self.sim.stage
    }

    #[must_use]
    pub fn road(&self) -> &Road {
        &self.sim.road
    }

    #[must_use]
    pub fn ferrari(&self) -> &Ferrari {
        &self.sim.ferrari
    }

    #[must_use]
    pub fn crash(&self) -> &Crash {
        &self.sim.crash
    }

    #[must_use]
    pub fn sprites(&self) -> &SpriteWorld {
        &self.sim.sprites
    }

    #[must_use]
    pub fn init_engine(&self) -> &InitEngine {
        &self.sim.engine
    }

    /// Serialize the whole simulation state.
    ///
    /// # Errors
    ///
    /// Propagates any bincode encoding error.
    pub fn save_state(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::encode_to_vec(&self.sim, bincode::config::standard())
    }

    /// Restore state written by [`Self::save_state`]. The engine is unchanged on error.
    ///
    /// # Errors
    ///
    /// Propagates any bincode decoding error.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), bincode::error::DecodeError> {
        let (sim, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
        self.sim = sim;
        Ok(())
    }
}

fn is_ingame(state: GameState) -> bool {
    matches!(state, GameState::Attract | GameState::InGame)
}

/// Three BCD digits of speed on the text layer, leading zeroes blanked.
fn write_speedo(speed: u16, sink: &mut dyn HardwareSink) {
    let bcd = outils::to_bcd(u32::from(speed.min(999)));
    let mut leading = true;
    for i in 0..3_u32 {
        let digit = ((bcd >> (8 - 4 * i)) & 0xF) as u16;
        leading &= digit == 0 && i < 2;
        let tile = if leading { 0 } else { DIGIT_TILE_BASE + digit };
        sink.write_text16(SPEEDO_ADDR + i * 2, tile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprites::entry::DRAW_SPRITE;
    use crate::testdata::{RecordingSink, TestTrack};
    use outrun_config::FrameRate;
    use test_log::test;

    const FULL_THROTTLE: OutRunInputs = OutRunInputs { accel: 0xFF, ..ZERO_INPUTS };
    const ZERO_INPUTS: OutRunInputs = OutRunInputs {
        steering: 0x80,
        accel: 0,
        brake: 0,
        left: false,
        right: false,
        accel_pressed: false,
        brake_pressed: false,
        gear_high: false,
        gear_toggle: false,
    };

    fn engine(config: OutRunConfig) -> (OutRunEngine<TestTrack>, RecordingSink) {
        let mut sink = RecordingSink::default();
        let mut engine = OutRunEngine::new(TestTrack::new(), config);
        engine.init_stage(0, &mut sink).unwrap();
        (engine, sink)
    }

    #[test]
    fn refuses_to_tick_before_init() {
        let mut engine = OutRunEngine::new(TestTrack::new(), OutRunConfig::default());
        let mut sink = RecordingSink::default();
        let mut sound = RecordingSink::default();

        assert_eq!(
            engine.tick(&ZERO_INPUTS, &mut sink, &mut sound),
            Err(OutRunError::NotInitialized)
        );
        assert_eq!(
            engine.run_frame(&ZERO_INPUTS, &mut sink, &mut sound),
            Err(OutRunError::NotInitialized)
        );

        assert_eq!(engine.init_stage(9, &mut sink), Err(OutRunError::InvalidStage(9)));
        assert_eq!(engine.stage(), None);
    }

    #[test]
    fn engine_connects_only_in_game() {
        let mut sound = RecordingSink::default();

        let (mut engine, mut sink) = engine(OutRunConfig::default());
        engine.set_game_state(GameState::StartLine);
        engine.signal_anim_seq_complete();
        assert_eq!(engine.game_state(), GameState::InGame);
        // Start sequence steps Seq1 -> Seq2 -> Init -> Logic
        for _ in 0..4 {
            engine.tick(&FULL_THROTTLE, &mut sink, &mut sound).unwrap();
        }
        assert_eq!(engine.ferrari().state, FerrariState::Logic);

        engine.tick(&FULL_THROTTLE, &mut sink, &mut sound).unwrap();
        assert!(engine.ferrari().car_increment > 0);
        assert!(engine.ferrari().torque_index > 0);
    }

    #[test]
    fn first_tick_from_standstill() {
        let mut sound = RecordingSink::default();
        let (mut engine, mut sink) = engine(OutRunConfig::default());
        engine.set_game_state(GameState::StartLine);
        engine.sim.ferrari.set_state(FerrariState::Logic);
        engine.sim.ferrari.ingame_engine = false;

        engine.tick(&FULL_THROTTLE, &mut sink, &mut sound).unwrap();
        assert!(engine.ferrari().car_increment > 0);
        assert_eq!(engine.ferrari().torque_index, 0);
    }

    #[test]
    fn logic_runs_once_per_30hz_tick() {
        let config = OutRunConfig { frame_rate: FrameRate::OneTwenty, ..OutRunConfig::default() };
        let (mut engine, mut sink) = engine(config);
        let mut sound = RecordingSink::default();
        engine.set_game_state(GameState::InGame);
        engine.sim.ferrari.set_state(FerrariState::Logic);
        engine.sim.ferrari.car_increment = 0x0100_0000;

        let effects: Vec<TickEffect> = (0..8)
            .map(|_| engine.run_frame(&ZERO_INPUTS, &mut sink, &mut sound).unwrap())
            .collect();
        assert_eq!(
            effects.iter().filter(|&&effect| effect == TickEffect::LogicTicked).count(),
            2
        );
        assert_eq!(effects[3], TickEffect::LogicTicked);

        // Position advanced in quarter steps between logic ticks
        assert!(engine.road().road_pos > 0);
    }

    #[test]
    fn frame_writes_reach_the_sink() {
        let (mut engine, mut sink) = engine(OutRunConfig::default());
        let mut sound = RecordingSink::default();
        engine.set_game_state(GameState::InGame);
        engine.sim.ferrari.set_state(FerrariState::Logic);
        engine.sim.ferrari.car_increment = 123 << 16;

        engine.tick(&ZERO_INPUTS, &mut sink, &mut sound).unwrap();

        assert!(!sink.road.is_empty());
        assert!(!engine.sprites().hw_sprites().is_empty());
        assert_ne!(engine.sprites().jump_table[FERRARI].control & DRAW_SPRITE, 0);

        let speed = engine.ferrari().speed();
        let digits = [speed / 100, speed / 10 % 10, speed % 10];
        for (i, digit) in digits.into_iter().enumerate() {
            let tile = sink.text.get(&(SPEEDO_ADDR + i as u32 * 2)).copied();
            if i == 0 && digit == 0 {
                assert_eq!(tile, Some(0));
            } else {
                assert_eq!(tile, Some(DIGIT_TILE_BASE + digit));
            }
        }
    }

    #[test]
    fn attract_mode_drives_itself() {
        let (mut engine, mut sink) = engine(OutRunConfig::default());
        let mut sound = RecordingSink::default();
        engine.sim.ferrari.set_state(FerrariState::Logic);

        for _ in 0..30 {
            engine.tick(&ZERO_INPUTS, &mut sink, &mut sound).unwrap();
        }
        assert!(engine.ferrari().speed() > 0);
        assert!(engine.road().road_pos > 0);
    }

    #[test]
    fn fork_loads_the_chosen_stage() {
        let (mut engine, mut sink) = engine(OutRunConfig::default());
        let mut sound = RecordingSink::default();
        engine.set_game_state(GameState::InGame);
        let next = engine.track().level(0).unwrap().next_stages.unwrap();

        engine.sim.engine.pending_stage = Some(next[1]);
        engine.tick(&ZERO_INPUTS, &mut sink, &mut sound).unwrap();
        assert_eq!(engine.stage(), Some(next[1]));
        assert_eq!(engine.init_engine().pending_stage, None);
    }

    #[test]
    fn fork_keeps_distance_driven_past_stage_end() {
        let (mut engine, mut sink) = engine(OutRunConfig::default());
        let mut sound = RecordingSink::default();
        engine.set_game_state(GameState::InGame);
        engine.sim.ferrari.set_state(FerrariState::Logic);
        engine.sim.ferrari.car_increment = 0x20 << 16;

        let length = engine.track().level(0).unwrap().length;
        let next = engine.track().level(0).unwrap().next_stages.unwrap();
        engine.sim.road.road_pos = u32::from(length) << 16;
        engine.sim.road.pos_fine = length << 4;
        engine.sim.road.pos_fine_old = length << 4;
        engine.sim.engine.pending_stage = Some(next[1]);

        engine.tick(&ZERO_INPUTS, &mut sink, &mut sound).unwrap();
        assert_eq!(engine.stage(), Some(next[1]));
        assert_eq!(engine.road().road_pos, 0x2000);
        assert_eq!(engine.road().pos_fine, 2);
        assert_eq!(engine.road().pos_fine_diff, 2);
    }

    #[test]
    fn final_stage_ends_in_bonus() {
        let (mut engine, mut sink) = engine(OutRunConfig::default());
        let mut sound = RecordingSink::default();
        let last = engine.track().stage_count() - 1;
        engine.init_stage(last, &mut sink).unwrap();
        engine.set_game_state(GameState::InGame);

        let length = engine.track().level(last).unwrap().length;
        engine.sim.road.road_pos = u32::from(length) << 16;
        engine.tick(&ZERO_INPUTS, &mut sink, &mut sound).unwrap();

        assert_eq!(engine.game_state(), GameState::Bonus);
        assert_eq!(engine.ferrari().state, FerrariState::EndSeq);
    }

    #[test]
    fn state_round_trips() {
        let (mut engine, mut sink) = engine(OutRunConfig::default());
        let mut sound = RecordingSink::default();
        engine.sim.ferrari.set_state(FerrariState::Logic);
        for _ in 0..10 {
            engine.tick(&ZERO_INPUTS, &mut sink, &mut sound).unwrap();
        }

        let saved = engine.save_state().unwrap();
        let road_pos = engine.road().road_pos;
        for _ in 0..10 {
            engine.tick(&ZERO_INPUTS, &mut sink, &mut sound).unwrap();
        }
        engine.load_state(&saved).unwrap();
        assert_eq!(engine.road().road_pos, road_pos);

        assert!(engine.load_state(&[0xFF]).is_err());
        assert_eq!(engine.road().road_pos, road_pos);
    }
}
