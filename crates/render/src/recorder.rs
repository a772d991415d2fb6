//! Frame capture
//!
//! [`FrameClock`] turns simulated time into a count of frames due at a fixed
//! fps, and [`FrameRecorder`] persists one numbered file per due frame until
//! the frame budget is spent.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::FrameRecorderConfig;
use crate::error::RecordError;
use crate::surface::RenderSurface;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Fixed-rate output clock. Frame `n` (1-based) falls due once `n / fps`
/// seconds of simulated time have elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameClock {
    fps: u32,
    elapsed: Duration,
    frames: u64,
}

impl FrameClock {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            elapsed: Duration::ZERO,
            frames: 0,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Frames handed out so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Instant at which frame `index` is due, rounded up to the nanosecond.
    pub fn frame_time(&self, index: u64) -> Duration {
        let fps = self.fps as u128;
        let nanos = (index as u128 * NANOS_PER_SEC).div_ceil(fps);
        duration_from_nanos(nanos)
    }

    /// Advance by `dt` and return how many frames became due.
    pub fn advance(&mut self, dt: Duration) -> u64 {
        self.elapsed = self.elapsed.saturating_add(dt);
        let total = self.elapsed.as_nanos() * self.fps as u128 / NANOS_PER_SEC;
        let total = u64::try_from(total).unwrap_or(u64::MAX);
        let due = total.saturating_sub(self.frames);
        self.frames += due;
        due
    }

    /// Simulated time left until the next frame falls due.
    pub fn time_until_next_frame(&self) -> Duration {
        self.frame_time(self.frames + 1).saturating_sub(self.elapsed)
    }
}

fn duration_from_nanos(nanos: u128) -> Duration {
    let secs = (nanos / NANOS_PER_SEC).min(u64::MAX as u128) as u64;
    Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)
}

/// Encodes a surface into one file.
pub trait FrameWriter {
    fn write(&mut self, path: &Path, surface: &RenderSurface) -> io::Result<()>;

    /// File extension without the dot
    fn extension(&self) -> &str;
}

/// RGBA8 PNG with fast compression.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngWriter;

impl FrameWriter for PngWriter {
    fn write(&mut self, path: &Path, surface: &RenderSurface) -> io::Result<()> {
        let file = File::create(path)?;
        let w = BufWriter::new(file);
        let mut encoder = png::Encoder::new(w, surface.width(), surface.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);

        let mut writer = encoder.write_header().map_err(io::Error::other)?;
        writer
            .write_image_data(surface.as_bytes())
            .map_err(io::Error::other)?;
        writer.finish().map_err(io::Error::other)?;
        Ok(())
    }

    fn extension(&self) -> &str {
        "png"
    }
}

pub struct FrameRecorder<W = PngWriter> {
    writer: W,
    dir: PathBuf,
    prefix: String,
    index_width: usize,
    frame_limit: u64,
    written: u64,
    retries: u32,
    backoff: Duration,
}

impl FrameRecorder<PngWriter> {
    pub fn new(config: &FrameRecorderConfig, dir: impl Into<PathBuf>) -> Result<Self, RecordError> {
        Self::with_writer(config, dir, PngWriter)
    }
}

impl<W: FrameWriter> FrameRecorder<W> {
    /// Create the output directory and a recorder writing through `writer`.
    pub fn with_writer(
        config: &FrameRecorderConfig,
        dir: impl Into<PathBuf>,
        writer: W,
    ) -> Result<Self, RecordError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| RecordError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        // wide enough for the last index, never narrower than 6
        let last = config.frame_limit.saturating_sub(1);
        let index_width = last.to_string().len().max(6);

        Ok(Self {
            writer,
            dir,
            prefix: config.file_prefix.clone(),
            index_width,
            frame_limit: config.frame_limit,
            written: 0,
            retries: config.write_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }

    pub fn frame_limit(&self) -> u64 {
        self.frame_limit
    }

    pub fn remaining(&self) -> u64 {
        self.frame_limit.saturating_sub(self.written)
    }

    pub fn is_complete(&self) -> bool {
        self.written >= self.frame_limit
    }

    pub fn output_dir(&self) -> &Path {
        &self.dir
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Path of frame `index`
    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!(
            "{}{:0width$}.{}",
            self.prefix,
            index,
            self.writer.extension(),
            width = self.index_width
        ))
    }

    /// Path the next capture will write to
    pub fn next_path(&self) -> PathBuf {
        self.frame_path(self.written)
    }

    /// Persist the next frame.
    ///
    /// Returns `Ok(false)` without writing once the budget is spent. A write
    /// that keeps failing after every retry is fatal; the index is not
    /// consumed so the numbering never has a gap.
    pub fn capture(&mut self, surface: &RenderSurface) -> Result<bool, RecordError> {
        if self.is_complete() {
            return Ok(false);
        }

        let path = self.next_path();
        let mut part = path.clone().into_os_string();
        part.push(".part");
        let part = PathBuf::from(part);

        let attempts = self.retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .writer
                .write(&part, surface)
                .and_then(|()| fs::rename(&part, &path));
            match result {
                Ok(()) => break,
                Err(source) if attempt >= attempts => {
                    let _ = fs::remove_file(&part);
                    return Err(RecordError::Write {
                        path,
                        attempts,
                        source,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "frame write {} failed (attempt {}/{}): {}",
                        path.display(),
                        attempt,
                        attempts,
                        e
                    );
                    std::thread::sleep(self.backoff * attempt);
                }
            }
        }

        self.written += 1;
        log::debug!("wrote {}", path.display());
        Ok(true)
    }
}
