//! Terminal preview of the render surface.
//!
//! The surface is downsampled into a character framebuffer using half-block
//! glyphs (two pixels per cell) and flushed to the terminal as changed runs.
//! The preview is read-only and never on the recording path.

pub mod fb;
pub mod monitor;
pub mod renderer;
pub mod throttle;

pub use blockbeat_render as render;

pub use fb::{Cell, CellStyle, FrameBuffer, HALF_BLOCK};
pub use monitor::{Monitor, MonitorStatus, WindowConfig};
pub use renderer::{encode_diff_into, encode_full_into, restore_terminal, TerminalRenderer};
pub use throttle::RenderThrottle;
