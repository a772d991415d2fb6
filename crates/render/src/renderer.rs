//! Board renderer
//!
//! Draws a [`BoardSnapshot`] and the current beat phase into the offscreen
//! [`RenderSurface`]. Drawing happens on a supersampled [`Canvas`] and is only
//! resolved into the surface once the whole frame succeeded, so a failed frame
//! leaves the previous image in place.

use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use crate::config::{validate_stroke, RenderConfig};
use crate::core::{BoardSnapshot, ConfigError};
use crate::error::RenderError;
use crate::raster::Canvas;
use crate::surface::{RenderSurface, Rgb};
use crate::types::{ParamName, PieceKind};

/// Live-tunable stroke weights, in texture pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub cell: f32,
    pub grid: f32,
    pub ring: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgb,
    pub board: Rgb,
    pub grid: Rgb,
    pub ring_track: Rgb,
    pub ring: Rgb,
    pub pieces: [Rgb; 7],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Rgb::new(12, 12, 18),
            board: Rgb::new(24, 24, 32),
            grid: Rgb::new(48, 48, 60),
            ring_track: Rgb::new(36, 36, 48),
            ring: Rgb::new(240, 240, 250),
            pieces: [
                Rgb::new(0, 240, 240), // I
                Rgb::new(240, 240, 0), // O
                Rgb::new(160, 0, 240), // T
                Rgb::new(0, 240, 0),   // S
                Rgb::new(240, 0, 0),   // Z
                Rgb::new(0, 0, 240),   // J
                Rgb::new(240, 160, 0), // L
            ],
        }
    }
}

impl Palette {
    pub fn piece(&self, kind: PieceKind) -> Rgb {
        self.pieces[(kind.color_id() - 1) as usize]
    }

    fn color_id(&self, id: u8) -> Option<Rgb> {
        PieceKind::from_color_id(id).map(|k| self.piece(k))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames: u64,
    pub failures: u64,
    pub over_budget: u64,
    pub last_duration: Duration,
}

/// Where things go on the texture. Recomputed per frame; cheap.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Layout {
    cell: f32,
    origin_x: f32,
    origin_y: f32,
    ring_cx: f32,
    ring_cy: f32,
    ring_radius: f32,
    /// Top-left of the next-piece preview and its cell size
    preview: Option<(f32, f32, f32)>,
}

impl Layout {
    fn compute(tex_w: f32, tex_h: f32, cols: u16, rows: u16, cell_size: f32, ring: f32) -> Self {
        let (cols_f, rows_f) = (cols.max(1) as f32, rows.max(1) as f32);
        let cell = cell_size
            .min(tex_w * 0.9 / cols_f)
            .min(tex_h * 0.9 / rows_f)
            .max(1.0);
        let board_w = cell * cols_f;
        let board_h = cell * rows_f;
        let origin_x = ((tex_w - board_w) / 2.0).floor();
        let origin_y = ((tex_h - board_h) / 2.0).floor();

        let half_diagonal = (board_w * board_w + board_h * board_h).sqrt() / 2.0;
        let ring_max = (tex_w.min(tex_h) / 2.0 - ring / 2.0 - 1.0).max(1.0);
        let ring_radius = (half_diagonal + ring + 4.0).min(ring_max);

        let preview_cell = (cell / 2.0).floor().max(1.0);
        let preview_x = origin_x + board_w + cell;
        let preview = (preview_x + preview_cell * 4.0 <= tex_w)
            .then_some((preview_x, origin_y, preview_cell));

        Self {
            cell,
            origin_x,
            origin_y,
            ring_cx: tex_w / 2.0,
            ring_cy: tex_h / 2.0,
            ring_radius,
            preview,
        }
    }

    fn cell_rect(&self, x: i16, y: i16) -> (f32, f32, f32, f32) {
        let x0 = self.origin_x + x as f32 * self.cell;
        let y0 = self.origin_y + y as f32 * self.cell;
        (x0, y0, x0 + self.cell, y0 + self.cell)
    }
}

pub struct Renderer {
    config: RenderConfig,
    cell_size: f32,
    style: StrokeStyle,
    palette: Palette,
    canvas: Canvas,
    surface: RenderSurface,
    budget: Duration,
    stats: RenderStats,
}

impl Renderer {
    /// Allocate the surface and the sample grid. `budget` of zero disables the
    /// frame-time warning.
    pub fn new(config: &RenderConfig, cell_size: f32, budget: Duration) -> Result<Self, RenderError> {
        let surface = RenderSurface::new(config.texture_width, config.texture_height)?;
        let mut canvas = Canvas::new();
        canvas.prepare(
            config.texture_width,
            config.texture_height,
            config.supersample(),
        )?;
        Ok(Self {
            config: config.clone(),
            cell_size,
            style: StrokeStyle {
                cell: config.cell_stroke_weight,
                grid: config.grid_stroke_weight,
                ring: config.ring_stroke_weight,
            },
            palette: Palette::default(),
            canvas,
            surface,
            budget,
            stats: RenderStats::default(),
        })
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn style(&self) -> StrokeStyle {
        self.style
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// Apply a live stroke-weight update. Other parameters are not ours.
    pub fn set_stroke_weight(&mut self, name: ParamName, value: f64) -> Result<f32, ConfigError> {
        let slot = match name {
            ParamName::CellStrokeWeight => &mut self.style.cell,
            ParamName::GridStrokeWeight => &mut self.style.grid,
            ParamName::RingStrokeWeight => &mut self.style.ring,
            _ => {
                return Err(ConfigError::Invalid {
                    param: "stroke_weight",
                    reason: format!("{} is not a stroke weight", name.as_str()),
                })
            }
        };
        *slot = validate_stroke(name.as_str(), value)?;
        Ok(*slot)
    }

    /// Draw a frame. On failure the error is logged, the previous frame stays
    /// on the surface and `false` is returned.
    pub fn render(&mut self, snapshot: &BoardSnapshot, beat_phase: f64) -> bool {
        match self.try_render(snapshot, beat_phase) {
            Ok(()) => true,
            Err(e) => {
                self.stats.failures += 1;
                log::warn!("render failed, reusing previous frame: {}", e);
                false
            }
        }
    }

    pub fn try_render(&mut self, snapshot: &BoardSnapshot, beat_phase: f64) -> Result<(), RenderError> {
        let started = Instant::now();

        let expected = snapshot.width as usize * snapshot.height as usize;
        if snapshot.cells.len() != expected {
            return Err(RenderError::SnapshotMismatch {
                cells: snapshot.cells.len(),
                expected,
            });
        }
        self.canvas.prepare(
            self.config.texture_width,
            self.config.texture_height,
            self.config.supersample(),
        )?;

        let layout = Layout::compute(
            self.config.texture_width as f32,
            self.config.texture_height as f32,
            snapshot.width,
            snapshot.height,
            self.cell_size,
            self.style.ring,
        );

        self.canvas.clear(self.palette.background);
        self.draw_ring(&layout, beat_phase);
        self.draw_board(&layout, snapshot);
        if self.config.draw_ghost {
            self.draw_ghost(&layout, snapshot);
        }
        self.draw_active(&layout, snapshot);
        if self.config.draw_next {
            self.draw_next(&layout, snapshot.next);
        }
        if !snapshot.playable() {
            let alpha = if snapshot.game_over() { 0.6 } else { 0.35 };
            let (x0, y0, _, _) = layout.cell_rect(0, 0);
            let (_, _, x1, y1) =
                layout.cell_rect(snapshot.width as i16 - 1, snapshot.height as i16 - 1);
            self.canvas
                .blend_rect(x0, y0, x1, y1, Rgb::new(0, 0, 0), alpha);
        }

        self.canvas.resolve_into(&mut self.surface);

        let elapsed = started.elapsed();
        self.stats.frames += 1;
        self.stats.last_duration = elapsed;
        if !self.budget.is_zero() && elapsed > self.budget {
            self.stats.over_budget += 1;
            log::warn!(
                "frame {} took {:?}, over the {:?} budget",
                self.stats.frames,
                elapsed,
                self.budget
            );
        }
        Ok(())
    }

    fn draw_ring(&mut self, layout: &Layout, beat_phase: f64) {
        let weight = self.style.ring;
        let resolution = self.config.arc_resolution;
        let (cx, cy, r) = (layout.ring_cx, layout.ring_cy, layout.ring_radius);
        self.canvas
            .stroke_arc(cx, cy, r, weight, 0.0, TAU, resolution, self.palette.ring_track);
        let sweep = (beat_phase.clamp(0.0, 1.0) as f32) * TAU;
        self.canvas
            .stroke_arc(cx, cy, r, weight, 0.0, sweep, resolution, self.palette.ring);
    }

    fn draw_cell(&mut self, rect: (f32, f32, f32, f32), fill: Rgb, stroke: f32, stroke_color: Rgb) {
        let (x0, y0, x1, y1) = rect;
        self.canvas.fill_rect(x0, y0, x1, y1, fill);
        self.canvas.stroke_rect(x0, y0, x1, y1, stroke, stroke_color);
    }

    fn draw_board(&mut self, layout: &Layout, snapshot: &BoardSnapshot) {
        let palette = self.palette;
        for y in 0..snapshot.height as i16 {
            for x in 0..snapshot.width as i16 {
                let rect = layout.cell_rect(x, y);
                match palette.color_id(snapshot.cell(x, y)) {
                    Some(color) => {
                        let edge = color.lerp(Rgb::new(0, 0, 0), 0.35);
                        self.draw_cell(rect, color, self.style.cell, edge);
                    }
                    None => self.draw_cell(rect, palette.board, self.style.grid, palette.grid),
                }
            }
        }
    }

    fn draw_ghost(&mut self, layout: &Layout, snapshot: &BoardSnapshot) {
        let (Some(active), Some(ghost_y)) = (snapshot.active, snapshot.ghost_y) else {
            return;
        };
        if ghost_y == active.y {
            return;
        }
        let color = self.palette.piece(active.kind);
        let dy = ghost_y - active.y;
        for (x, y) in active.cells() {
            if y + dy < 0 {
                continue;
            }
            let (x0, y0, x1, y1) = layout.cell_rect(x, y + dy);
            self.canvas.blend_rect(x0, y0, x1, y1, color, 0.25);
            self.canvas
                .stroke_rect(x0, y0, x1, y1, self.style.grid, color.lerp(self.palette.board, 0.5));
        }
    }

    fn draw_active(&mut self, layout: &Layout, snapshot: &BoardSnapshot) {
        let Some(active) = snapshot.active else {
            return;
        };
        // brighten as the lock timer runs out
        let color = self
            .palette
            .piece(active.kind)
            .lerp(Rgb::new(255, 255, 255), snapshot.lock_progress * 0.5);
        let edge = color.lerp(Rgb::new(0, 0, 0), 0.35);
        for (x, y) in active.cells() {
            if y < 0 {
                continue;
            }
            self.draw_cell(layout.cell_rect(x, y), color, self.style.cell, edge);
        }
    }

    fn draw_next(&mut self, layout: &Layout, next: PieceKind) {
        let Some((px, py, cell)) = layout.preview else {
            return;
        };
        let color = self.palette.piece(next);
        let edge = color.lerp(Rgb::new(0, 0, 0), 0.35);
        let stroke = (self.style.cell / 2.0).max(if self.style.cell > 0.0 { 1.0 } else { 0.0 });
        for (mx, my) in crate::core::get_shape(next, crate::types::Rotation::North) {
            let x0 = px + mx as f32 * cell;
            let y0 = py + my as f32 * cell;
            self.draw_cell((x0, y0, x0 + cell, y0 + cell), color, stroke, edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BoardConfig, BoardState, PieceSequence, SpeedConfig};

    fn small_config() -> RenderConfig {
        RenderConfig {
            texture_width: 64,
            texture_height: 96,
            texture_samples: 1,
            ..RenderConfig::default()
        }
    }

    fn snapshot() -> BoardSnapshot {
        let board = BoardConfig {
            width: 4,
            height: 6,
            piece_sequence: PieceSequence(vec![PieceKind::O]),
            ..BoardConfig::default()
        };
        let mut state = BoardState::new(&board, &SpeedConfig::default()).unwrap();
        state.start();
        state.snapshot()
    }

    #[test]
    fn layout_centers_board_and_shrinks_cells_to_fit() {
        let layout = Layout::compute(100.0, 100.0, 10, 20, 24.0, 4.0);
        assert!(layout.cell * 20.0 <= 90.0);
        let board_w = layout.cell * 10.0;
        assert!((layout.origin_x - (100.0 - board_w) / 2.0).abs() <= 1.0);
    }

    #[test]
    fn renders_active_piece_color() {
        let mut r = Renderer::new(&small_config(), 10.0, Duration::ZERO).unwrap();
        let snap = snapshot();
        assert!(r.render(&snap, 0.0));

        let layout = Layout::compute(64.0, 96.0, 4, 6, 10.0, r.style().ring);
        let (x, y) = snap.active.unwrap().cells()[0];
        let (x0, y0, _, _) = layout.cell_rect(x, y);
        let center = r
            .surface()
            .pixel((x0 + 5.0) as u32, (y0 + 5.0) as u32)
            .unwrap();
        assert_eq!(center, Palette::default().piece(PieceKind::O));
    }

    #[test]
    fn mismatched_snapshot_keeps_previous_frame() {
        let mut r = Renderer::new(&small_config(), 10.0, Duration::ZERO).unwrap();
        assert!(r.render(&snapshot(), 0.5));
        let before = r.surface().clone();

        let mut broken = snapshot();
        broken.cells.pop();
        assert!(!r.render(&broken, 0.9));
        assert_eq!(r.surface(), &before);
        assert_eq!(r.stats().failures, 1);
        assert_eq!(r.stats().frames, 1);
    }

    #[test]
    fn beat_phase_changes_the_frame() {
        let mut r = Renderer::new(&small_config(), 10.0, Duration::ZERO).unwrap();
        let snap = snapshot();
        r.render(&snap, 0.1);
        let early = r.surface().fingerprint();
        r.render(&snap, 0.8);
        assert_ne!(early, r.surface().fingerprint());
    }

    #[test]
    fn stroke_updates_are_validated() {
        let mut r = Renderer::new(&small_config(), 10.0, Duration::ZERO).unwrap();
        assert_eq!(r.set_stroke_weight(ParamName::RingStrokeWeight, 3.0).unwrap(), 3.0);
        assert!(r.set_stroke_weight(ParamName::CellStrokeWeight, -1.0).is_err());
        assert!(r.set_stroke_weight(ParamName::Bpm, 1.0).is_err());
        assert_eq!(r.style().ring, 3.0);
    }
}
