//! Live terminal preview of the render surface.
//!
//! Best effort: the preview is throttled, skips unchanged frames, and switches
//! itself off on the first terminal error. Nothing it does can fail a run.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::time::Instant;

use anyhow::Result;
use serde::Deserialize;

use crate::fb::{Cell, CellStyle, FrameBuffer};
use crate::render::core::error::{in_range, ConfigError};
use crate::render::{RenderSurface, Rgb};
use crate::renderer::TerminalRenderer;
use crate::throttle::RenderThrottle;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub enabled: bool,
    /// Preview size in terminal columns
    pub width: u16,
    /// Preview size in terminal rows, including the status line
    pub height: u16,
    pub max_fps: u32,
    pub idle_refresh_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 80,
            height: 40,
            max_fps: 15,
            idle_refresh_ms: 1000,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        in_range("window.width", self.width as f64, 4.0, 1000.0)?;
        in_range("window.height", self.height as f64, 2.0, 1000.0)?;
        in_range("window.max_fps", self.max_fps as f64, 0.0, 240.0)?;
        Ok(())
    }
}

/// Run counters shown under the preview.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonitorStatus {
    pub frame: u64,
    pub frame_limit: u64,
    pub beat: u64,
    pub bpm: f64,
    pub score: u32,
    pub lines: u32,
    pub level: u32,
    pub episode: u32,
    pub phase: &'static str,
}

pub struct Monitor<W: Write = io::Stdout> {
    renderer: TerminalRenderer<W>,
    fb: FrameBuffer,
    throttle: RenderThrottle,
    started: Instant,
    enabled: bool,
    entered: bool,
    drawn: u64,
    line: String,
}

impl Monitor<io::Stdout> {
    /// Preview on stdout, shrunk to the current terminal size. Disabled when
    /// the config says so or there is no terminal to draw on.
    pub fn new(config: &WindowConfig) -> Self {
        let mut config = config.clone();
        if config.enabled {
            match crossterm::terminal::size() {
                Ok((cols, rows)) => {
                    config.width = config.width.min(cols);
                    config.height = config.height.min(rows);
                }
                Err(e) => {
                    log::warn!("no terminal for the monitor, preview disabled: {}", e);
                    config.enabled = false;
                }
            }
        }
        Self::with_writer(&config, io::stdout())
    }
}

impl<W: Write> Monitor<W> {
    pub fn with_writer(config: &WindowConfig, out: W) -> Self {
        Self {
            renderer: TerminalRenderer::with_writer(out),
            fb: FrameBuffer::new(config.width, config.height),
            throttle: RenderThrottle::from_fps(config.max_fps, config.idle_refresh_ms),
            started: Instant::now(),
            enabled: config.enabled && config.width > 0 && config.height > 1,
            entered: false,
            drawn: 0,
            line: String::with_capacity(128),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn frames_drawn(&self) -> u64 {
        self.drawn
    }

    pub fn frames_skipped(&self) -> u64 {
        self.throttle.skipped()
    }

    pub fn writer(&self) -> &W {
        self.renderer.writer()
    }

    /// Show `surface` if the throttle allows. Returns whether a frame was drawn.
    pub fn present(&mut self, surface: &RenderSurface, status: &MonitorStatus) -> bool {
        if !self.enabled {
            return false;
        }
        let now_ms = self.started.elapsed().as_millis() as u64;
        if !self.throttle.should_render(now_ms, surface.fingerprint()) {
            return false;
        }
        match self.draw(surface, status) {
            Ok(()) => {
                self.drawn += 1;
                true
            }
            Err(e) => {
                log::warn!("monitor disabled after terminal error: {:#}", e);
                self.enabled = false;
                let _ = self.close();
                false
            }
        }
    }

    fn draw(&mut self, surface: &RenderSurface, status: &MonitorStatus) -> Result<()> {
        if !self.entered {
            self.renderer.enter()?;
            self.entered = true;
        }
        let (w, h) = (self.fb.width(), self.fb.height());
        self.fb.clear(Cell::default());
        self.fb.blit_surface(0, 0, w, h - 1, surface);

        self.line.clear();
        write!(
            self.line,
            " frame {}/{}  beat {} @ {:.1} bpm  score {}  lines {}  level {}  ep {}  {}",
            status.frame,
            status.frame_limit,
            status.beat,
            status.bpm,
            status.score,
            status.lines,
            status.level,
            status.episode,
            status.phase
        )?;
        let style = CellStyle {
            fg: Rgb::new(180, 180, 190),
            bg: Rgb::new(0, 0, 0),
            dim: true,
        };
        self.fb.put_str(0, h - 1, &self.line, style);

        self.renderer.draw_swap(&mut self.fb)
    }

    /// Leave the alternate screen. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        self.entered = false;
        self.renderer.exit()
    }
}

impl<W: Write> Drop for Monitor<W> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts `budget` bytes, then fails every write.
    struct BrokenPipe {
        budget: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget < buf.len() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
            }
            self.budget -= buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn config() -> WindowConfig {
        WindowConfig {
            width: 8,
            height: 5,
            max_fps: 0,
            ..WindowConfig::default()
        }
    }

    #[test]
    fn draws_preview_and_status_line() {
        let mut monitor = Monitor::with_writer(&config(), Vec::new());
        let surface = RenderSurface::new(8, 8).unwrap();
        let status = MonitorStatus {
            frame: 3,
            frame_limit: 10,
            ..MonitorStatus::default()
        };
        assert!(monitor.present(&surface, &status));
        let out = String::from_utf8_lossy(monitor.writer()).into_owned();
        assert!(out.contains('\u{2580}'));
        assert!(out.contains("frame"));
    }

    #[test]
    fn unchanged_frames_are_skipped() {
        let cfg = WindowConfig {
            idle_refresh_ms: 60_000,
            ..config()
        };
        let mut monitor = Monitor::with_writer(&cfg, Vec::new());
        let surface = RenderSurface::new(8, 8).unwrap();
        assert!(monitor.present(&surface, &MonitorStatus::default()));
        assert!(!monitor.present(&surface, &MonitorStatus::default()));
        assert_eq!(monitor.frames_skipped(), 1);
    }

    #[test]
    fn write_error_disables_the_monitor() {
        let mut monitor = Monitor::with_writer(&config(), BrokenPipe { budget: 0 });
        let surface = RenderSurface::new(8, 8).unwrap();
        assert!(!monitor.present(&surface, &MonitorStatus::default()));
        assert!(!monitor.is_enabled());
        assert!(!monitor.present(&surface, &MonitorStatus::default()));
    }

    #[test]
    fn disabled_config_never_draws() {
        let cfg = WindowConfig {
            enabled: false,
            ..config()
        };
        let mut monitor = Monitor::with_writer(&cfg, Vec::new());
        assert!(!monitor.present(&RenderSurface::new(2, 2).unwrap(), &MonitorStatus::default()));
        assert!(monitor.writer().is_empty());
    }
}
