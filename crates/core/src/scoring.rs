//! Scoring - classic line-clear table plus drop points

use crate::types::{LINES_PER_LEVEL, LINE_SCORES};

/// Points for clearing `lines` rows at `level` (0-based).
///
/// More than four rows (not reachable through a single lock) scores as four.
pub fn calculate_line_score(lines: usize, level: u32) -> u32 {
    if lines == 0 {
        return 0;
    }
    LINE_SCORES[lines.min(4)].saturating_mul(level + 1)
}

/// Drop points: one per soft-dropped cell, two per hard-dropped cell.
pub fn calculate_drop_score(cells: u32, hard: bool) -> u32 {
    if hard {
        cells.saturating_mul(2)
    } else {
        cells
    }
}

pub fn level_for_lines(lines: u32) -> u32 {
    lines / LINES_PER_LEVEL
}
