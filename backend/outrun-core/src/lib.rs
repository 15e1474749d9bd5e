mod api;
pub mod attract;
pub mod crash;
pub mod ferrari;
pub mod initengine;
pub mod inputs;
pub mod outils;
pub mod road;
pub mod scenery;
pub mod sound;
pub mod sprites;
pub mod track;
pub mod traffic;

#[cfg(test)]
mod testdata;

pub use api::{GameState, OutRunEngine, OutRunError, OutRunResult, SPEEDO_ADDR, TEXT_RAM};
pub use track::{Level, Rom, TrackData};
