//! Simulation core - pure, deterministic, and testable
//!
//! Everything that decides *what happens* lives here: the grid, the pieces, the
//! gravity/beat clocks and the board state machine. No I/O, no threads, no
//! rendering. Feeding the same configuration and the same sequence of
//! `(dt, actions)` always produces the same board.
//!
//! # Module Structure
//!
//! - [`board`]: fixed-size grid with collision checks and row clearing
//! - [`pieces`]: tetromino shapes and SRS rotation with wall kicks
//! - [`rng`]: seeded 7-bag or fixed cycling piece order
//! - [`scoring`]: line and drop points
//! - [`timebase`]: gravity step accumulator and beat phase
//! - [`board_state`]: spawn / fall / lock / clear state machine
//! - [`snapshot`]: read-only copy handed to renderers
//! - [`config`]: startup configuration for the board and the clocks
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use blockbeat_core::{BoardConfig, BoardState, SpeedConfig, TimeBase};
//!
//! let board_cfg = BoardConfig { width: 4, height: 6, ..BoardConfig::default() };
//! let speed = SpeedConfig::default();
//!
//! let mut clock = TimeBase::new(&speed).unwrap();
//! let mut board = BoardState::new(&board_cfg, &speed).unwrap();
//! board.start();
//!
//! let dt = Duration::from_secs(1);
//! let steps = clock.advance(dt);
//! let report = board.advance(dt, steps);
//! assert_eq!(report.steps, 1);
//! ```

pub mod board;
pub mod board_state;
pub mod config;
pub mod error;
pub mod pieces;
pub mod rng;
pub mod scoring;
pub mod snapshot;
pub mod timebase;

pub use blockbeat_types as types;

pub use board::Board;
pub use board_state::{BoardState, LockEvent, Phase, Piece, StepOutcome, TickReport};
pub use config::{BoardConfig, PieceSequence, SpeedConfig};
pub use error::ConfigError;
pub use pieces::{get_shape, try_rotate};
pub use rng::{PieceQueue, SimpleRng};
pub use scoring::{calculate_drop_score, calculate_line_score};
pub use snapshot::{ActiveSnapshot, BoardSnapshot};
pub use timebase::{TempoCoupling, TimeBase};
