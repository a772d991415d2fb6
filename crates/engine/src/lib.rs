//! Run orchestration: configuration loading and the tick loop that ties the
//! clocks, the board, the renderer, the recorder and the preview together.

pub mod config;
pub mod error;
pub mod session;

pub use blockbeat_control as control;
pub use blockbeat_core as core;
pub use blockbeat_render as render;
pub use blockbeat_term as term;
pub use blockbeat_types as types;

pub use config::{ClockMode, Config, GameOverPolicy, RunConfig};
pub use error::SessionError;
pub use session::{Pacer, RunSummary, Session, StopReason, WallClock};
