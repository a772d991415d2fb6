//! Offscreen RGBA render target.

use crate::error::RenderError;

/// 24-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear mix, `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

/// Allocate a zeroed buffer without aborting on failure.
pub(crate) fn try_alloc(len: usize) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| RenderError::Allocation { bytes: len })?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Byte length of a `width x height` buffer with `channels` bytes per pixel.
pub(crate) fn buffer_len(width: u32, height: u32, channels: usize) -> Result<usize, RenderError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels))
        .ok_or(RenderError::TooLarge { width, height })
}

/// `texture_width x texture_height` RGBA8 pixels, row-major, top row first.
///
/// Allocated once at startup and redrawn in place every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let len = buffer_len(width, height, 4)?;
        let mut pixels = try_alloc(len)?;
        // opaque black
        for px in pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some(Rgb::new(self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]))
    }

    pub fn fill(&mut self, color: Rgb) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, 255]);
        }
    }

    /// Cheap content hash (FNV-1a), used to skip identical preview redraws.
    pub fn fingerprint(&self) -> u64 {
        let mut hash: u64 = 0xcbf29ce484222325;
        for &b in &self.pixels {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash
    }
}
