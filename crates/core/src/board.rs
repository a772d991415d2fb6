//! Board module - manages the game grid
//!
//! The board is a `width x height` grid where each cell is empty or holds the
//! kind (color) of the piece that filled it. Dimensions are fixed at
//! construction. Storage is a flat row-major vector for cache locality.
//! Coordinates: (x, y) where x grows left to right and y grows top to bottom,
//! so row 0 is the spawn edge and row `height - 1` is the floor.

use arrayvec::ArrayVec;

use crate::types::{Cell, PieceKind};

/// A single lock can complete at most this many rows.
pub const MAX_CLEARED_ROWS: usize = 4;

/// Rows removed by [`Board::clear_full_rows`], bottom to top.
pub type ClearedRows = ArrayVec<u16, MAX_CLEARED_ROWS>;

/// The game board
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    width: u16,
    height: u16,
    /// Flat array of cells, row-major order (y * width + x)
    cells: Vec<Cell>,
}

impl Board {
    /// Create a new empty board
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        }
    }

    #[inline(always)]
    fn index(&self, x: i16, y: i16) -> Option<usize> {
        if self.is_out_of_bounds(x, y) {
            return None;
        }
        Some((y as usize) * (self.width as usize) + (x as usize))
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Get cell at position (x, y). `None` if out of bounds.
    pub fn get(&self, x: i16, y: i16) -> Option<Cell> {
        self.index(x, y).map(|idx| self.cells[idx])
    }

    /// Set cell at position (x, y). Returns false if out of bounds.
    pub fn set(&mut self, x: i16, y: i16, cell: Cell) -> bool {
        match self.index(x, y) {
            Some(idx) => {
                self.cells[idx] = cell;
                true
            }
            None => false,
        }
    }

    /// Within bounds and empty
    pub fn is_valid(&self, x: i16, y: i16) -> bool {
        matches!(self.get(x, y), Some(None))
    }

    /// Within bounds and filled
    pub fn is_occupied(&self, x: i16, y: i16) -> bool {
        matches!(self.get(x, y), Some(Some(_)))
    }

    pub fn is_out_of_bounds(&self, x: i16, y: i16) -> bool {
        x < 0 || y < 0 || x >= self.width as i16 || y >= self.height as i16
    }

    fn row(&self, y: usize) -> &[Cell] {
        let w = self.width as usize;
        &self.cells[y * w..(y + 1) * w]
    }

    /// Check if a row is completely filled
    pub fn is_row_full(&self, y: u16) -> bool {
        if y >= self.height {
            return false;
        }
        self.row(y as usize).iter().all(|cell| cell.is_some())
    }

    /// Remove every full row, shifting the rows above down.
    ///
    /// Two-pointer compaction from the floor upwards; no allocation. Calling it
    /// on a board without full rows leaves the board untouched and returns an
    /// empty list. More than [`MAX_CLEARED_ROWS`] full rows (only reachable
    /// through [`Board::set`]) are all cleared, the extra ones are not reported.
    pub fn clear_full_rows(&mut self) -> ClearedRows {
        let mut cleared = ClearedRows::new();
        let width = self.width as usize;
        let mut write_y = self.height as usize;

        for read_y in (0..self.height as usize).rev() {
            if self.is_row_full(read_y as u16) {
                let _ = cleared.try_push(read_y as u16);
                continue;
            }
            write_y -= 1;
            if write_y != read_y {
                let src = read_y * width;
                self.cells.copy_within(src..src + width, write_y * width);
            }
        }

        for cell in &mut self.cells[..write_y * width] {
            *cell = None;
        }

        cleared
    }

    /// Lock a piece onto the board at given position with given shape
    ///
    /// Returns false (and writes nothing) if any cell is out of bounds or occupied.
    pub fn lock_piece(&mut self, shape: &[(i16, i16)], x: i16, y: i16, kind: PieceKind) -> bool {
        if !shape.iter().all(|&(dx, dy)| self.is_valid(x + dx, y + dy)) {
            return false;
        }
        for &(dx, dy) in shape {
            self.set(x + dx, y + dy, Some(kind));
        }
        true
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Number of filled cells
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Write color ids (0 = empty) into `out`, reusing its allocation.
    pub fn write_color_ids(&self, out: &mut Vec<u8>) {
        out.clear();
        out.extend(
            self.cells
                .iter()
                .map(|c| c.map(|kind| kind.color_id()).unwrap_or(0)),
        );
    }

    pub fn clear(&mut self) {
        self.cells.fill(None);
    }
}
