//! Character-cell framebuffer for the terminal preview.

use crate::render::{RenderSurface, Rgb};

/// Upper half block: foreground paints the top pixel, background the bottom.
pub const HALF_BLOCK: char = '\u{2580}';

/// Minimal per-cell styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellStyle {
    pub fg: Rgb,
    pub bg: Rgb,
    pub dim: bool,
}

impl Default for CellStyle {
    fn default() -> Self {
        Self {
            fg: Rgb::new(220, 220, 220),
            bg: Rgb::new(0, 0, 0),
            dim: false,
        }
    }
}

/// A single terminal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: CellStyle,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: CellStyle::default(),
        }
    }
}

/// 2D framebuffer of styled character cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        let len = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![Cell::default(); len],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Resize, keeping the allocation when possible.
    pub fn resize(&mut self, width: u16, height: u16) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        let len = (width as usize) * (height as usize);
        self.cells.resize(len, Cell::default());
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline(always)]
    fn idx(&self, x: u16, y: u16) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize) * (self.width as usize) + (x as usize))
    }

    pub fn get(&self, x: u16, y: u16) -> Option<Cell> {
        self.idx(x, y).map(|i| self.cells[i])
    }

    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(i) = self.idx(x, y) {
            self.cells[i] = cell;
        }
    }

    pub fn clear(&mut self, cell: Cell) {
        self.cells.fill(cell);
    }

    pub fn put_str(&mut self, x: u16, y: u16, s: &str, style: CellStyle) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width {
                break;
            }
            self.set(cx, y, Cell { ch, style });
            cx += 1;
        }
    }

    /// Downsample `surface` into the `cols x rows` block at `(x, y)`.
    ///
    /// Each cell covers two vertically stacked preview pixels drawn with
    /// [`HALF_BLOCK`]; each preview pixel is the box average of the surface
    /// region it covers. The aspect ratio is kept and the image is centred.
    pub fn blit_surface(&mut self, x: u16, y: u16, cols: u16, rows: u16, surface: &RenderSurface) {
        let (sw, sh) = (surface.width() as u64, surface.height() as u64);
        if cols == 0 || rows == 0 || sw == 0 || sh == 0 {
            return;
        }

        // preview pixels are square: one column wide, half a row tall
        let (max_w, max_h) = (cols as u64, rows as u64 * 2);
        let (pw, ph) = if sw * max_h > sh * max_w {
            (max_w, (sh * max_w / sw).max(1))
        } else {
            ((sw * max_h / sh).max(1), max_h)
        };
        let off_x = x + ((max_w - pw) / 2) as u16;
        let off_y = y + ((max_h - ph) / 4) as u16;

        let sample = |px: u64, py: u64| -> Rgb {
            let (x0, x1) = (px * sw / pw, ((px + 1) * sw / pw).max(px * sw / pw + 1));
            let (y0, y1) = (py * sh / ph, ((py + 1) * sh / ph).max(py * sh / ph + 1));
            let mut acc = [0u64; 3];
            for sy in y0..y1.min(sh) {
                for sx in x0..x1.min(sw) {
                    if let Some(c) = surface.pixel(sx as u32, sy as u32) {
                        acc[0] += c.r as u64;
                        acc[1] += c.g as u64;
                        acc[2] += c.b as u64;
                    }
                }
            }
            let n = ((x1.min(sw) - x0) * (y1.min(sh) - y0)).max(1);
            Rgb::new((acc[0] / n) as u8, (acc[1] / n) as u8, (acc[2] / n) as u8)
        };

        for cy in 0..ph.div_ceil(2) {
            for cx in 0..pw {
                let top = sample(cx, cy * 2);
                let bottom = if cy * 2 + 1 < ph {
                    sample(cx, cy * 2 + 1)
                } else {
                    Rgb::default()
                };
                self.set(
                    off_x + cx as u16,
                    off_y + cy as u16,
                    Cell {
                        ch: HALF_BLOCK,
                        style: CellStyle {
                            fg: top,
                            bg: bottom,
                            dim: false,
                        },
                    },
                );
            }
        }
    }
}
