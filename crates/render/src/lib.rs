//! Offscreen rendering and frame capture.
//!
//! The [`Renderer`] owns the [`RenderSurface`] and redraws it from a
//! [`BoardSnapshot`](blockbeat_core::BoardSnapshot) every frame; the
//! [`FrameRecorder`] and any preview only borrow it between renders.

pub mod config;
pub mod error;
pub mod raster;
pub mod recorder;
pub mod renderer;
pub mod surface;

pub use blockbeat_core as core;
pub use blockbeat_types as types;

pub use config::{FrameRecorderConfig, PathConfig, RenderConfig};
pub use error::{RecordError, RenderError};
pub use raster::Canvas;
pub use recorder::{FrameClock, FrameRecorder, FrameWriter, PngWriter};
pub use renderer::{Palette, RenderStats, Renderer, StrokeStyle};
pub use surface::{RenderSurface, Rgb};
