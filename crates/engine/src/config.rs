//! Startup configuration.
//!
//! One JSON document, every section optional:
//!
//! ```json
//! {
//!   "board": { "width": 10, "height": 20, "cell_size": 24 },
//!   "speed": { "gravity_interval": 1.0, "lock_delay": 0.5, "bpm": 120 },
//!   "render": { "texture_width": 640, "texture_height": 640, "texture_samples": 4 },
//!   "frame_recorder": { "frame_limit": 900, "fps": 30 },
//!   "path": { "output_directory": "frames" },
//!   "osc": { "rx_port": 9000 },
//!   "window": { "width": 80, "height": 40 },
//!   "run": { "clock": "offline", "game_over": "hold" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::control::OscConfig;
use crate::core::{BoardConfig, ConfigError, SpeedConfig};
use crate::error::SessionError;
use crate::render::{FrameRecorderConfig, PathConfig, RenderConfig};
use crate::term::WindowConfig;

/// How simulated time relates to the wall clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Exactly one frame period per tick, as fast as the machine allows
    #[default]
    Offline,
    /// Wall-clock time, paced to the output fps
    Realtime,
}

/// What a topped-out board does to the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverPolicy {
    /// Keep recording the final board
    #[default]
    Hold,
    Stop,
    Restart,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub clock: ClockMode,
    pub game_over: GameOverPolicy,
    /// Render time that triggers a warning; 0 uses one frame period
    pub render_budget_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub board: BoardConfig,
    pub speed: SpeedConfig,
    pub render: RenderConfig,
    pub frame_recorder: FrameRecorderConfig,
    pub path: PathConfig,
    pub osc: OscConfig,
    pub window: WindowConfig,
    pub run: RunConfig,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let json = std::fs::read_to_string(path).map_err(|source| SessionError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Apply `BLOCKBEAT_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, var: impl Fn(&str) -> Option<String>) {
        self.osc.apply_env_from(&var);
        if let Some(dir) = var("BLOCKBEAT_OUTPUT_DIR").filter(|s| !s.trim().is_empty()) {
            self.path.output_directory = PathBuf::from(dir);
        }
    }

    /// First invalid setting, if any.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.board.validate()?;
        self.speed.validate()?;
        self.render.validate()?;
        self.frame_recorder.validate()?;
        self.window.validate()?;
        if self.osc.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                param: "osc.queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
