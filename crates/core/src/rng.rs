//! Piece generation - seeded 7-bag randomizer or a fixed cycling sequence
//!
//! Both modes are fully deterministic: the same seed (or sequence) always
//! yields the same pieces, which keeps recorded runs reproducible.

use crate::types::PieceKind;

/// Simple LCG (Linear Congruential Generator) RNG
/// Uses constants from Numerical Recipes
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u32,
}

impl SimpleRng {
    /// Create a new RNG with the given seed. A zero seed is bumped to 1.
    pub fn new(seed: u32) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state
    }

    /// Random value in `[0, max)`
    pub fn next_range(&mut self, max: u32) -> u32 {
        self.next_u32() % max
    }

    /// Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_range((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Bag {
        bag: [PieceKind; 7],
        index: usize,
        rng: SimpleRng,
    },
    Cycle {
        pieces: Vec<PieceKind>,
        index: usize,
    },
}

/// Queue of upcoming pieces
#[derive(Debug, Clone)]
pub struct PieceQueue {
    seed: u32,
    source: Source,
}

impl PieceQueue {
    /// 7-bag queue seeded with `seed`
    pub fn new(seed: u32) -> Self {
        let mut rng = SimpleRng::new(seed);
        let mut bag = PieceKind::ALL;
        rng.shuffle(&mut bag);
        Self {
            seed,
            source: Source::Bag { bag, index: 0, rng },
        }
    }

    /// Queue that cycles through `pieces` forever. Falls back to a 7-bag when empty.
    pub fn from_sequence(seed: u32, pieces: &[PieceKind]) -> Self {
        if pieces.is_empty() {
            return Self::new(seed);
        }
        Self {
            seed,
            source: Source::Cycle {
                pieces: pieces.to_vec(),
                index: 0,
            },
        }
    }

    /// A fresh queue with the same seed/sequence, as used by a board reset.
    pub fn restarted(&self) -> Self {
        match &self.source {
            Source::Bag { .. } => Self::new(self.seed),
            Source::Cycle { pieces, .. } => Self::from_sequence(self.seed, pieces),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Next piece without consuming it
    pub fn peek(&self) -> PieceKind {
        match &self.source {
            Source::Bag { bag, index, rng } => {
                if *index < bag.len() {
                    return bag[*index];
                }
                // Preview the next bag with a copy of the RNG so `draw` stays consistent.
                let mut preview = rng.clone();
                let mut next = PieceKind::ALL;
                preview.shuffle(&mut next);
                next[0]
            }
            Source::Cycle { pieces, index } => pieces[*index % pieces.len()],
        }
    }

    /// Draw the next piece
    pub fn draw(&mut self) -> PieceKind {
        match &mut self.source {
            Source::Bag { bag, index, rng } => {
                if *index >= bag.len() {
                    *bag = PieceKind::ALL;
                    rng.shuffle(bag);
                    *index = 0;
                }
                let piece = bag[*index];
                *index += 1;
                piece
            }
            Source::Cycle { pieces, index } => {
                let piece = pieces[*index % pieces.len()];
                *index = (*index + 1) % pieces.len();
                piece
            }
        }
    }
}

impl Default for PieceQueue {
    fn default() -> Self {
        Self::new(1)
    }
}
