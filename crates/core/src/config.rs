//! Startup configuration for the board and the simulation clocks.
//!
//! These structs are read once at startup. The live-tunable subset
//! (gravity_interval, lock_delay, bpm, beat_division) only changes afterwards
//! through the control channel.

use serde::Deserialize;

use crate::error::{in_range, non_negative_seconds, positive_seconds, ConfigError};
use crate::timebase::TempoCoupling;
use crate::types::{
    PieceKind, DEFAULT_BOARD_HEIGHT, DEFAULT_BOARD_WIDTH, DEFAULT_BPM,
    DEFAULT_GRAVITY_INTERVAL_SECS, DEFAULT_LOCK_DELAY_SECS, DEFAULT_MAX_CATCH_UP_STEPS,
};

/// Largest accepted board edge, in cells
pub const MAX_BOARD_EDGE: u16 = 512;

/// Largest accepted tempo
pub const MAX_BPM: f64 = 999.0;

/// Fixed piece order, written as a list of letters: `["i", "o", "t"]`.
///
/// Empty means "use the seeded 7-bag".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct PieceSequence(pub Vec<PieceKind>);

impl TryFrom<Vec<String>> for PieceSequence {
    type Error = String;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        value
            .iter()
            .map(|s| PieceKind::from_str(s).ok_or_else(|| format!("unknown piece kind {s:?}")))
            .collect::<Result<Vec<_>, _>>()
            .map(PieceSequence)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Columns
    pub width: u16,
    /// Rows
    pub height: u16,
    /// Edge of one cell in texture pixels
    pub cell_size: f32,
    pub seed: u32,
    /// Left column of a spawned piece's bounding box; centered when unset
    pub spawn_column: Option<i16>,
    /// Row of a spawned piece's topmost mino
    pub spawn_row: i16,
    pub piece_sequence: PieceSequence,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_BOARD_WIDTH,
            height: DEFAULT_BOARD_HEIGHT,
            cell_size: 24.0,
            seed: 1,
            spawn_column: None,
            spawn_row: 0,
            piece_sequence: PieceSequence::default(),
        }
    }
}

impl BoardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        in_range("board.width", self.width as f64, 4.0, MAX_BOARD_EDGE as f64)?;
        in_range("board.height", self.height as f64, 2.0, MAX_BOARD_EDGE as f64)?;
        in_range("board.cell_size", self.cell_size as f64, 1.0, 4096.0)?;
        in_range(
            "board.spawn_row",
            self.spawn_row as f64,
            0.0,
            (self.height - 1) as f64,
        )?;
        if let Some(col) = self.spawn_column {
            in_range(
                "board.spawn_column",
                col as f64,
                0.0,
                (self.width - 1) as f64,
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Seconds per gravity step
    pub gravity_interval: f64,
    /// Seconds a resting piece waits before it commits
    pub lock_delay: f64,
    pub bpm: f64,
    pub coupling: TempoCoupling,
    /// Gravity steps a single tick may run before the remaining debt is dropped
    pub max_catch_up_steps: u32,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            gravity_interval: DEFAULT_GRAVITY_INTERVAL_SECS,
            lock_delay: DEFAULT_LOCK_DELAY_SECS,
            bpm: DEFAULT_BPM,
            coupling: TempoCoupling::Independent,
            max_catch_up_steps: DEFAULT_MAX_CATCH_UP_STEPS,
        }
    }
}

impl SpeedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_seconds("speed.gravity_interval", self.gravity_interval)?;
        non_negative_seconds("speed.lock_delay", self.lock_delay)?;
        in_range("speed.bpm", self.bpm, f64::MIN_POSITIVE, MAX_BPM)?;
        in_range(
            "speed.max_catch_up_steps",
            self.max_catch_up_steps as f64,
            1.0,
            10_000.0,
        )?;
        self.coupling.validate()
    }
}
