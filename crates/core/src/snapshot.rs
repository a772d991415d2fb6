use crate::board_state::{Phase, Piece};
use crate::pieces::get_shape;
use crate::types::{PieceKind, Rotation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActiveSnapshot {
    pub kind: PieceKind,
    pub rotation: Rotation,
    pub x: i16,
    pub y: i16,
}

impl ActiveSnapshot {
    /// Board coordinates of the four minos
    pub fn cells(&self) -> [(i16, i16); 4] {
        get_shape(self.kind, self.rotation).map(|(mx, my)| (self.x + mx, self.y + my))
    }
}

impl From<Piece> for ActiveSnapshot {
    fn from(value: Piece) -> Self {
        Self {
            kind: value.kind,
            rotation: value.rotation,
            x: value.x,
            y: value.y,
        }
    }
}

/// Read-only copy of a [`BoardState`](crate::BoardState) for renderers.
///
/// Refilled in place every frame through `snapshot_into`; `cells` keeps its
/// allocation across frames.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub width: u16,
    pub height: u16,
    /// Row-major color ids, 0 = empty
    pub cells: Vec<u8>,
    pub active: Option<ActiveSnapshot>,
    pub ghost_y: Option<i16>,
    pub next: PieceKind,
    pub phase: Phase,
    pub paused: bool,
    pub episode: u32,
    pub piece_id: u32,
    pub steps: u64,
    pub score: u32,
    pub lines: u32,
    pub level: u32,
    /// 0.0..=1.0
    pub lock_progress: f32,
}

impl BoardSnapshot {
    /// Color id at (x, y), 0 when empty or out of bounds.
    pub fn cell(&self, x: i16, y: i16) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i16 || y >= self.height as i16 {
            return 0;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .unwrap_or(0)
    }

    pub fn game_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn playable(&self) -> bool {
        !self.game_over() && !self.paused
    }
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            cells: Vec::new(),
            active: None,
            ghost_y: None,
            next: PieceKind::I,
            phase: Phase::Spawning,
            paused: false,
            episode: 0,
            piece_id: 0,
            steps: 0,
            score: 0,
            lines: 0,
            level: 0,
            lock_progress: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_lookup_is_bounds_checked() {
        let snap = BoardSnapshot {
            width: 2,
            height: 2,
            cells: vec![0, 1, 2, 3],
            ..BoardSnapshot::default()
        };
        assert_eq!(snap.cell(1, 0), 1);
        assert_eq!(snap.cell(1, 1), 3);
        assert_eq!(snap.cell(2, 0), 0);
        assert_eq!(snap.cell(-1, 1), 0);
    }
}
