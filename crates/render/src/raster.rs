//! Supersampled rasterizer
//!
//! Shapes are drawn into an RGB sample grid `factor` times larger than the
//! target on each axis, then box-filtered down into the [`RenderSurface`].
//! Coordinates are in target pixels; a sample at grid position `(sx, sy)` sits
//! at `((sx + 0.5) / factor, (sy + 0.5) / factor)`.

use std::f32::consts::TAU;

use crate::error::RenderError;
use crate::surface::{buffer_len, try_alloc, RenderSurface, Rgb};

#[derive(Debug, Clone, Default)]
pub struct Canvas {
    width: u32,
    height: u32,
    factor: u32,
    samples: Vec<u8>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the sample grid. Keeps the allocation when the size is unchanged.
    pub fn prepare(&mut self, width: u32, height: u32, factor: u32) -> Result<(), RenderError> {
        let factor = factor.max(1);
        if self.width == width && self.height == height && self.factor == factor {
            return Ok(());
        }
        let sw = width
            .checked_mul(factor)
            .ok_or(RenderError::TooLarge { width, height })?;
        let sh = height
            .checked_mul(factor)
            .ok_or(RenderError::TooLarge { width, height })?;
        // release the old grid first so a resize does not need both at once
        self.samples = Vec::new();
        self.samples = try_alloc(buffer_len(sw, sh, 3)?)?;
        self.width = width;
        self.height = height;
        self.factor = factor;
        Ok(())
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    fn grid_width(&self) -> usize {
        (self.width * self.factor) as usize
    }

    fn grid_height(&self) -> usize {
        (self.height * self.factor) as usize
    }

    pub fn clear(&mut self, color: Rgb) {
        for px in self.samples.chunks_exact_mut(3) {
            px.copy_from_slice(&[color.r, color.g, color.b]);
        }
    }

    /// Half-open sample index range whose centers fall in `[lo, hi)`.
    fn span(&self, lo: f32, hi: f32, limit: usize) -> (usize, usize) {
        let f = self.factor as f32;
        let start = (lo * f - 0.5).ceil().max(0.0) as usize;
        let end = ((hi * f - 0.5).ceil().max(0.0) as usize).min(limit);
        (start.min(limit), end)
    }

    #[inline]
    fn put(&mut self, sx: usize, sy: usize, color: Rgb, alpha: f32) {
        let i = (sy * self.grid_width() + sx) * 3;
        let px = &mut self.samples[i..i + 3];
        if alpha >= 1.0 {
            px.copy_from_slice(&[color.r, color.g, color.b]);
        } else {
            let dst = Rgb::new(px[0], px[1], px[2]).lerp(color, alpha);
            px.copy_from_slice(&[dst.r, dst.g, dst.b]);
        }
    }

    pub fn fill_rect(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgb) {
        self.blend_rect(x0, y0, x1, y1, color, 1.0);
    }

    /// Fill with `alpha` coverage over what is already drawn.
    pub fn blend_rect(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgb, alpha: f32) {
        if alpha <= 0.0 {
            return;
        }
        let (sx0, sx1) = self.span(x0, x1, self.grid_width());
        let (sy0, sy1) = self.span(y0, y1, self.grid_height());
        for sy in sy0..sy1 {
            for sx in sx0..sx1 {
                self.put(sx, sy, color, alpha);
            }
        }
    }

    /// Outline drawn inside the rectangle, `weight` pixels thick.
    pub fn stroke_rect(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, weight: f32, color: Rgb) {
        if weight <= 0.0 {
            return;
        }
        let w = weight.min((x1 - x0) / 2.0).min((y1 - y0) / 2.0);
        self.fill_rect(x0, y0, x1, y0 + w, color);
        self.fill_rect(x0, y1 - w, x1, y1, color);
        self.fill_rect(x0, y0 + w, x0 + w, y1 - w, color);
        self.fill_rect(x1 - w, y0 + w, x1, y1 - w, color);
    }

    /// Fill a convex quad (either winding).
    pub fn fill_quad(&mut self, pts: [(f32, f32); 4], color: Rgb) {
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for &(x, y) in &pts {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let (sx0, sx1) = self.span(min_x, max_x, self.grid_width());
        let (sy0, sy1) = self.span(min_y, max_y, self.grid_height());
        let f = self.factor as f32;

        for sy in sy0..sy1 {
            let py = (sy as f32 + 0.5) / f;
            for sx in sx0..sx1 {
                let px = (sx as f32 + 0.5) / f;
                if inside_convex(&pts, px, py) {
                    self.put(sx, sy, color, 1.0);
                }
            }
        }
    }

    /// Ring segment centred on `(cx, cy)`.
    ///
    /// Angles are in radians, `0` at twelve o'clock, growing clockwise. A full
    /// circle uses `resolution` segments; shorter sweeps use proportionally
    /// fewer (at least one).
    #[allow(clippy::too_many_arguments)]
    pub fn stroke_arc(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        weight: f32,
        start: f32,
        sweep: f32,
        resolution: u32,
        color: Rgb,
    ) {
        if weight <= 0.0 || sweep <= 0.0 || radius <= 0.0 {
            return;
        }
        let sweep = sweep.min(TAU);
        let segments = ((resolution as f32 * sweep / TAU).ceil() as u32).max(1);
        let inner = (radius - weight / 2.0).max(0.0);
        let outer = radius + weight / 2.0;
        let point = |r: f32, a: f32| (cx + r * a.sin(), cy - r * a.cos());

        for i in 0..segments {
            let a0 = start + sweep * i as f32 / segments as f32;
            let a1 = start + sweep * (i + 1) as f32 / segments as f32;
            self.fill_quad(
                [point(outer, a0), point(outer, a1), point(inner, a1), point(inner, a0)],
                color,
            );
        }
    }

    /// Box-filter the sample grid into `surface`, which must match the canvas size.
    pub fn resolve_into(&self, surface: &mut RenderSurface) {
        debug_assert_eq!((surface.width(), surface.height()), (self.width, self.height));
        let f = self.factor as usize;
        let gw = self.grid_width();
        let count = (f * f) as u32;
        let width = self.width as usize;
        let out = surface.as_bytes_mut();

        for y in 0..self.height as usize {
            for x in 0..width {
                let mut acc = [0u32; 3];
                for sy in y * f..(y + 1) * f {
                    let row = sy * gw;
                    for sx in x * f..(x + 1) * f {
                        let i = (row + sx) * 3;
                        acc[0] += self.samples[i] as u32;
                        acc[1] += self.samples[i + 1] as u32;
                        acc[2] += self.samples[i + 2] as u32;
                    }
                }
                let o = (y * width + x) * 4;
                out[o] = ((acc[0] + count / 2) / count) as u8;
                out[o + 1] = ((acc[1] + count / 2) / count) as u8;
                out[o + 2] = ((acc[2] + count / 2) / count) as u8;
                out[o + 3] = 255;
            }
        }
    }
}

fn inside_convex(pts: &[(f32, f32); 4], px: f32, py: f32) -> bool {
    let mut pos = false;
    let mut neg = false;
    for i in 0..4 {
        let (ax, ay) = pts[i];
        let (bx, by) = pts[(i + 1) % 4];
        let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
        pos |= cross > 0.0;
        neg |= cross < 0.0;
        if pos && neg {
            return false;
        }
    }
    true
}
