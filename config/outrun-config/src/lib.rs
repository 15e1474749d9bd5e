use bincode::{Decode, Encode};
use outrun_proc_macros::{ConfigDisplay, EnumAll, EnumDisplay, EnumFromStr};

pub const STEER_SPEED_RANGE: std::ops::RangeInclusive<u8> = 1..=9;
pub const PEDAL_SPEED_RANGE: std::ops::RangeInclusive<u8> = 1..=9;
pub const MAX_TRAFFIC: u8 = 8;

/// Displayed frame rate. Game logic always runs at 30Hz; faster rates sub-step motion.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay, EnumFromStr, EnumAll,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(outrun_proc_macros::CustomValueEnum))]
pub enum FrameRate {
    #[default]
    Thirty,
    Sixty,
    OneTwenty,
}

impl FrameRate {
    /// Number of displayed frames per 30Hz logic tick.
    #[inline]
    #[must_use]
    pub const fn substeps(self) -> u32 {
        1 << self.increment_shift()
    }

    /// Right shift applied to per-frame motion increments.
    #[inline]
    #[must_use]
    pub const fn increment_shift(self) -> u32 {
        match self {
            Self::Thirty => 0,
            Self::Sixty => 1,
            Self::OneTwenty => 2,
        }
    }
}

/// Whether to reproduce known bugs in the arcade game logic or use corrected behaviour.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay, EnumFromStr, EnumAll,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(outrun_proc_macros::CustomValueEnum))]
pub enum BugMode {
    #[default]
    Original,
    Patched,
}

impl BugMode {
    #[inline]
    #[must_use]
    pub fn is_patched(self) -> bool {
        self == Self::Patched
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay, EnumFromStr, EnumAll,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(outrun_proc_macros::CustomValueEnum))]
pub enum GearMode {
    #[default]
    Manual,
    Automatic,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, EnumDisplay, EnumFromStr, EnumAll,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(outrun_proc_macros::CustomValueEnum))]
pub enum InputMode {
    /// Cabinet wheel and pedals; raw bytes are used as-is
    #[default]
    Analog,
    /// Keyboard/joypad; buttons ramp the simulated analog values
    Digital,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, ConfigDisplay)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OutRunConfig {
    pub frame_rate: FrameRate,
    pub bug_mode: BugMode,
    pub gear_mode: GearMode,
    pub input_mode: InputMode,
    pub steer_speed: u8,
    pub pedal_speed: u8,
    pub traffic_max: u8,
    pub widescreen: bool,
}

impl Default for OutRunConfig {
    fn default() -> Self {
        Self {
            frame_rate: FrameRate::default(),
            bug_mode: BugMode::default(),
            gear_mode: GearMode::default(),
            input_mode: InputMode::default(),
            steer_speed: 3,
            pedal_speed: 3,
            traffic_max: MAX_TRAFFIC,
            widescreen: false,
        }
    }
}

impl OutRunConfig {
    /// Clamp ramp speeds and traffic density into their supported ranges.
    #[must_use]
    pub fn clamped(self) -> Self {
        let steer_speed = clamp_logged("steer_speed", self.steer_speed, STEER_SPEED_RANGE);
        let pedal_speed = clamp_logged("pedal_speed", self.pedal_speed, PEDAL_SPEED_RANGE);
        let traffic_max = clamp_logged("traffic_max", self.traffic_max, 1..=MAX_TRAFFIC);

        Self { steer_speed, pedal_speed, traffic_max, ..self }
    }
}

fn clamp_logged(name: &str, value: u8, range: std::ops::RangeInclusive<u8>) -> u8 {
    let clamped = value.clamp(*range.start(), *range.end());
    if clamped != value {
        log::warn!("Clamped {name} from {value} to {clamped}");
    }
    clamped
}

/// Snapshot of the player controls for one logic tick.
///
/// Analog fields are the raw cabinet bytes (steering $00-$FF centred on $80, pedals $00-$FF).
/// Digital fields are only consulted when the engine runs in [`InputMode::Digital`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct OutRunInputs {
    pub steering: u8,
    pub accel: u8,
    pub brake: u8,
    pub left: bool,
    pub right: bool,
    pub accel_pressed: bool,
    pub brake_pressed: bool,
    /// Gear lever position in manual mode (analog cabinets)
    pub gear_high: bool,
    /// Edge-triggered gear change (digital controls)
    pub gear_toggle: bool,
}

impl Default for OutRunInputs {
    fn default() -> Self {
        Self {
            steering: 0x80,
            accel: 0,
            brake: 0,
            left: false,
            right: false,
            accel_pressed: false,
            brake_pressed: false,
            gear_high: false,
            gear_toggle: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn frame_rate_substeps() {
        assert_eq!(FrameRate::Thirty.substeps(), 1);
        assert_eq!(FrameRate::Sixty.substeps(), 2);
        assert_eq!(FrameRate::OneTwenty.substeps(), 4);
        assert_eq!(FrameRate::OneTwenty.increment_shift(), 2);
    }

    #[test]
    fn clamped_config() {
        let config = OutRunConfig {
            steer_speed: 0,
            pedal_speed: 12,
            traffic_max: 20,
            ..OutRunConfig::default()
        }
        .clamped();
        assert_eq!(config.steer_speed, 1);
        assert_eq!(config.pedal_speed, 9);
        assert_eq!(config.traffic_max, MAX_TRAFFIC);
    }

    #[test]
    fn config_display_mentions_bug_mode() {
        let display = OutRunConfig::default().to_string();
        assert!(display.contains("bug_mode: Original"));
        assert!(display.contains("frame_rate: Thirty"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn loads_partial_toml() {
        let config: OutRunConfig = toml::from_str(
            r#"
                frame_rate = "Sixty"
                bug_mode = "Patched"
            "#,
        )
        .unwrap();
        assert_eq!(config.frame_rate, FrameRate::Sixty);
        assert_eq!(config.bug_mode, BugMode::Patched);
        assert_eq!(config.traffic_max, MAX_TRAFFIC);
    }
}
