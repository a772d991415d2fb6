use std::path::PathBuf;

use serde::Deserialize;

use crate::core::error::{in_range, ConfigError};
use crate::types::{DEFAULT_FPS, DEFAULT_FRAME_LIMIT};

/// Largest texture edge accepted, in pixels
pub const MAX_TEXTURE_EDGE: u32 = 8192;

/// Largest supersampling factor per axis
pub const MAX_SUPERSAMPLE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub texture_width: u32,
    pub texture_height: u32,
    /// Antialiasing samples per pixel; rounded up to a square grid
    pub texture_samples: u32,
    /// Segments used to tessellate a full beat ring
    pub arc_resolution: u32,
    pub cell_stroke_weight: f32,
    pub grid_stroke_weight: f32,
    pub ring_stroke_weight: f32,
    pub draw_ghost: bool,
    pub draw_next: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            texture_width: 640,
            texture_height: 640,
            texture_samples: 4,
            arc_resolution: 96,
            cell_stroke_weight: 2.0,
            grid_stroke_weight: 1.0,
            ring_stroke_weight: 6.0,
            draw_ghost: true,
            draw_next: true,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max_edge = MAX_TEXTURE_EDGE as f64;
        in_range("render.texture_width", self.texture_width as f64, 1.0, max_edge)?;
        in_range("render.texture_height", self.texture_height as f64, 1.0, max_edge)?;
        in_range("render.texture_samples", self.texture_samples as f64, 1.0, 16.0)?;
        in_range("render.arc_resolution", self.arc_resolution as f64, 3.0, 4096.0)?;
        validate_stroke("render.cell_stroke_weight", self.cell_stroke_weight as f64)?;
        validate_stroke("render.grid_stroke_weight", self.grid_stroke_weight as f64)?;
        validate_stroke("render.ring_stroke_weight", self.ring_stroke_weight as f64)?;
        Ok(())
    }

    /// Supersampling factor per axis: `ceil(sqrt(texture_samples))`.
    pub fn supersample(&self) -> u32 {
        let mut factor = 1;
        while factor * factor < self.texture_samples && factor < MAX_SUPERSAMPLE {
            factor += 1;
        }
        factor
    }
}

/// Stroke weights are in texture pixels, 0 disables the stroke.
pub fn validate_stroke(param: &'static str, value: f64) -> Result<f32, ConfigError> {
    in_range(param, value, 0.0, 256.0).map(|v| v as f32)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrameRecorderConfig {
    /// Disable to run without writing frames (monitor only)
    pub enabled: bool,
    /// Frame file name prefix, followed by the zero-padded index
    pub file_prefix: String,
    pub frame_limit: u64,
    pub fps: u32,
    /// Extra attempts after a failed write
    pub write_retries: u32,
    /// Sleep before retry `n` is `n * retry_backoff_ms`
    pub retry_backoff_ms: u64,
}

impl Default for FrameRecorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_prefix: "frame_".to_string(),
            frame_limit: DEFAULT_FRAME_LIMIT,
            fps: DEFAULT_FPS,
            write_retries: 3,
            retry_backoff_ms: 20,
        }
    }
}

impl FrameRecorderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        in_range("frame_recorder.frame_limit", self.frame_limit as f64, 1.0, 1e12)?;
        in_range("frame_recorder.fps", self.fps as f64, 1.0, 1000.0)?;
        if self.file_prefix.contains(['/', '\\']) {
            return Err(ConfigError::Invalid {
                param: "frame_recorder.file_prefix",
                reason: "must not contain path separators".to_string(),
            });
        }
        in_range("frame_recorder.write_retries", self.write_retries as f64, 0.0, 100.0)?;
        in_range(
            "frame_recorder.retry_backoff_ms",
            self.retry_backoff_ms as f64,
            0.0,
            10_000.0,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub output_directory: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("frames"),
        }
    }
}
