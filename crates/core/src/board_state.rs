//! Board state - the falling-piece simulation
//!
//! [`BoardState::step`] is the only thing that moves a piece down or commits
//! it. It is called once per gravity step handed out by the time base. Player
//! actions go through [`BoardState::apply_action`] and are applied between
//! steps; an action that would collide or leave the board is a no-op.
//!
//! Lock delay is measured in simulated time: [`BoardState::advance`] counts the
//! lock timer down by the tick's `dt` before running the tick's gravity steps,
//! so a resting piece commits `lock_delay` after it first touched down, not on
//! the next gravity step.
//!
//! Rotation uses SRS kicks (first fitting kick wins, O never rotates).

use std::time::Duration;

use crate::board::{Board, ClearedRows};
use crate::config::{BoardConfig, SpeedConfig};
use crate::error::{non_negative_seconds, ConfigError};
use crate::pieces::{get_shape, shape_bounds, try_rotate, PieceShape};
use crate::rng::PieceQueue;
use crate::scoring::{calculate_drop_score, calculate_line_score, level_for_lines};
use crate::snapshot::{ActiveSnapshot, BoardSnapshot};
use crate::types::{GameAction, PieceKind, Rotation, LOCK_RESET_LIMIT};

/// Simulation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No active piece; the next step spawns one
    Spawning,
    /// Active piece can still move down
    Falling,
    /// Active piece rests on a surface and the lock timer runs
    Locking,
    /// A piece was just committed; the next step spawns
    Cleared,
    /// Spawn area blocked. Terminal until reset.
    GameOver,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Spawning => "spawning",
            Phase::Falling => "falling",
            Phase::Locking => "locking",
            Phase::Cleared => "cleared",
            Phase::GameOver => "game_over",
        }
    }
}

/// Active falling piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceKind,
    pub rotation: Rotation,
    pub x: i16,
    pub y: i16,
}

impl Piece {
    pub fn shape(&self) -> PieceShape {
        get_shape(self.kind, self.rotation)
    }

    /// Every mino in bounds and on an empty cell
    pub fn is_valid(&self, board: &Board) -> bool {
        self.fits(board, 0, 0)
    }

    /// Resting on the floor or on a filled cell
    pub fn is_grounded(&self, board: &Board) -> bool {
        !self.fits(board, 0, 1)
    }

    fn fits(&self, board: &Board, dx: i16, dy: i16) -> bool {
        self.shape()
            .iter()
            .all(|&(mx, my)| board.is_valid(self.x + mx + dx, self.y + my + dy))
    }

    fn shifted(self, dx: i16, dy: i16) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// Board coordinates of the four minos
    pub fn cells(&self) -> [(i16, i16); 4] {
        self.shape().map(|(mx, my)| (self.x + mx, self.y + my))
    }

    /// Board row of the lowest mino
    pub fn bottom(&self) -> i16 {
        let (_, _, _, max_y) = shape_bounds(&self.shape());
        self.y + max_y
    }
}

/// Per-piece lock delay.
///
/// Touching down on a row deeper than any the piece reached before starts a
/// fresh timer. Touching down again at or above that row (after a kick lifted
/// the piece, say) costs one reset; with none left the timer resumes where it
/// stopped, so a piece cannot stall by hopping.
#[derive(Debug, Clone, Copy, Default)]
struct LockTimer {
    /// `None` while the timer is not running
    elapsed: Option<Duration>,
    /// Time already spent when the timer was last cancelled
    carried: Duration,
    resets: u8,
    /// Deepest bottom row the piece has rested on
    lowest: Option<i16>,
}

impl LockTimer {
    fn start(&mut self, bottom: i16) {
        if self.elapsed.is_some() {
            return;
        }
        if self.lowest.map_or(true, |lowest| bottom > lowest) {
            self.lowest = Some(bottom);
            self.elapsed = Some(Duration::ZERO);
        } else if self.resets < LOCK_RESET_LIMIT {
            self.resets += 1;
            self.elapsed = Some(Duration::ZERO);
        } else {
            self.elapsed = Some(self.carried);
        }
    }

    fn cancel(&mut self) {
        if let Some(elapsed) = self.elapsed.take() {
            self.carried = elapsed;
        }
    }

    /// Restart a running timer, limited to [`LOCK_RESET_LIMIT`] per piece.
    fn reset(&mut self) {
        if self.elapsed.is_some() && self.resets < LOCK_RESET_LIMIT {
            self.elapsed = Some(Duration::ZERO);
            self.resets += 1;
        }
    }

    fn expired(&self, delay: Duration) -> bool {
        matches!(self.elapsed, Some(e) if e >= delay)
    }
}

/// A piece committed into the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEvent {
    pub kind: PieceKind,
    /// Cleared row indices, bottom to top, as they were before the shift
    pub rows: ClearedRows,
    /// Line-clear points awarded for this commit
    pub score: u32,
}

/// What a single [`BoardState::step`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Paused or game over; nothing changed
    Idle,
    Spawned(PieceKind),
    /// Moved down one row
    Fell,
    /// Could not move down; lock timer running
    Resting,
    Committed(LockEvent),
    /// The spawn area was blocked
    ToppedOut,
}

/// Summary of one [`BoardState::advance`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub steps: u32,
    pub spawned: u32,
    pub locks: u32,
    pub lines: u32,
    pub game_over: bool,
}

impl TickReport {
    fn record(&mut self, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Spawned(_) => self.spawned += 1,
            StepOutcome::Committed(event) => {
                self.locks += 1;
                self.lines += event.rows.len() as u32;
            }
            StepOutcome::ToppedOut => self.game_over = true,
            StepOutcome::Idle | StepOutcome::Fell | StepOutcome::Resting => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoardState {
    board: Board,
    active: Option<Piece>,
    queue: PieceQueue,
    phase: Phase,
    lock: LockTimer,
    lock_delay: Duration,
    spawn_column: Option<i16>,
    spawn_row: i16,
    paused: bool,
    /// Increments on reset
    episode: u32,
    /// Increments on every successful spawn
    piece_id: u32,
    steps: u64,
    score: u32,
    lines: u32,
    level: u32,
}

impl BoardState {
    pub fn new(board: &BoardConfig, speed: &SpeedConfig) -> Result<Self, ConfigError> {
        board.validate()?;
        let lock_delay = non_negative_seconds("lock_delay", speed.lock_delay)?;
        Ok(Self {
            board: Board::new(board.width, board.height),
            active: None,
            queue: PieceQueue::from_sequence(board.seed, &board.piece_sequence.0),
            phase: Phase::Spawning,
            lock: LockTimer::default(),
            lock_delay,
            spawn_column: board.spawn_column,
            spawn_row: board.spawn_row,
            paused: false,
            episode: 0,
            piece_id: 0,
            steps: 0,
            score: 0,
            lines: 0,
            level: 0,
        })
    }

    /// Spawn the first piece. Does nothing once a piece has been spawned.
    pub fn start(&mut self) {
        if self.phase == Phase::Spawning && self.active.is_none() {
            self.spawn();
        }
    }

    /// Empty the board and start a new episode with a fresh piece queue.
    pub fn reset(&mut self) {
        self.board.clear();
        self.queue = self.queue.restarted();
        self.active = None;
        self.phase = Phase::Spawning;
        self.lock = LockTimer::default();
        self.paused = false;
        self.episode = self.episode.wrapping_add(1);
        self.score = 0;
        self.lines = 0;
        self.level = 0;
        log::info!("board reset (episode {})", self.episode);
        self.spawn();
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn active(&self) -> Option<Piece> {
        self.active
    }

    pub fn next_piece(&self) -> PieceKind {
        self.queue.peek()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn episode(&self) -> u32 {
        self.episode
    }

    pub fn piece_id(&self) -> u32 {
        self.piece_id
    }

    /// Gravity steps run since creation (idle steps excluded)
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lines(&self) -> u32 {
        self.lines
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn lock_delay(&self) -> Duration {
        self.lock_delay
    }

    /// Replace the lock delay. Negative and non-finite values are rejected and
    /// the previous delay stays in effect. A running timer keeps its elapsed time.
    pub fn set_lock_delay(&mut self, secs: f64) -> Result<Duration, ConfigError> {
        self.lock_delay = non_negative_seconds("lock_delay", secs)?;
        Ok(self.lock_delay)
    }

    /// Fraction of the lock delay already spent, `0.0` when not locking.
    pub fn lock_progress(&self) -> f32 {
        match self.lock.elapsed {
            None => 0.0,
            Some(_) if self.lock_delay.is_zero() => 1.0,
            Some(e) => (e.as_secs_f64() / self.lock_delay.as_secs_f64()).min(1.0) as f32,
        }
    }

    /// Row the active piece would land on
    pub fn ghost_y(&self) -> Option<i16> {
        let active = self.active?;
        Some(active.y + self.drop_distance(&active))
    }

    fn drop_distance(&self, piece: &Piece) -> i16 {
        let mut distance = 0;
        while piece.fits(&self.board, 0, distance + 1) {
            distance += 1;
        }
        distance
    }

    /// Run one tick: count the lock timer down by `dt`, then run `steps`
    /// gravity steps.
    pub fn advance(&mut self, dt: Duration, steps: u32) -> TickReport {
        let mut report = TickReport::default();
        if self.paused || self.phase == Phase::GameOver {
            return report;
        }

        if let Some(elapsed) = self.lock.elapsed {
            self.lock.elapsed = Some(elapsed.saturating_add(dt));
            if self.phase == Phase::Locking && self.lock.expired(self.lock_delay) {
                let outcome = self.commit();
                report.record(&outcome);
            }
        }

        for _ in 0..steps {
            let outcome = self.step();
            if outcome == StepOutcome::Idle {
                break;
            }
            report.steps += 1;
            report.record(&outcome);
        }
        report
    }

    /// One gravity step.
    pub fn step(&mut self) -> StepOutcome {
        if self.paused || self.phase == Phase::GameOver {
            return StepOutcome::Idle;
        }
        self.steps = self.steps.saturating_add(1);

        let Some(active) = self.active else {
            return self.spawn();
        };

        if active.fits(&self.board, 0, 1) {
            self.active = Some(active.shifted(0, 1));
            self.lock.cancel();
            self.settle();
            return StepOutcome::Fell;
        }

        self.lock.start(active.bottom());
        self.phase = Phase::Locking;
        if self.lock.expired(self.lock_delay) {
            return self.commit();
        }
        StepOutcome::Resting
    }

    /// Apply a player action between steps. Returns whether anything changed.
    pub fn apply_action(&mut self, action: GameAction) -> bool {
        match action {
            GameAction::Pause => {
                self.paused = !self.paused;
                log::debug!("paused: {}", self.paused);
                return true;
            }
            GameAction::Restart => {
                self.reset();
                return true;
            }
            _ => {}
        }
        if self.paused || self.phase == Phase::GameOver {
            return false;
        }
        let Some(active) = self.active else {
            return false;
        };

        match action {
            GameAction::MoveLeft => self.try_shift(active, -1),
            GameAction::MoveRight => self.try_shift(active, 1),
            GameAction::SoftDrop => {
                if !active.fits(&self.board, 0, 1) {
                    return false;
                }
                self.active = Some(active.shifted(0, 1));
                self.lock.cancel();
                self.settle();
                self.score = self.score.saturating_add(calculate_drop_score(1, false));
                true
            }
            GameAction::HardDrop => {
                let distance = self.drop_distance(&active);
                let landed = active.shifted(0, distance);
                self.active = Some(landed);
                self.score = self
                    .score
                    .saturating_add(calculate_drop_score(distance as u32, true));
                self.lock.start(landed.bottom());
                self.phase = Phase::Locking;
                true
            }
            GameAction::RotateCw => self.try_rotate(active, true),
            GameAction::RotateCcw => self.try_rotate(active, false),
            GameAction::Pause | GameAction::Restart => false,
        }
    }

    fn try_shift(&mut self, active: Piece, dx: i16) -> bool {
        if !active.fits(&self.board, dx, 0) {
            return false;
        }
        self.active = Some(active.shifted(dx, 0));
        self.after_move();
        true
    }

    fn try_rotate(&mut self, active: Piece, clockwise: bool) -> bool {
        let board = &self.board;
        let Some(rotated) = try_rotate(
            active.kind,
            active.rotation,
            active.x,
            active.y,
            clockwise,
            |x, y| board.is_valid(x, y),
        ) else {
            return false;
        };
        self.active = Some(Piece {
            rotation: rotated.rotation,
            x: rotated.x,
            y: rotated.y,
            ..active
        });
        self.after_move();
        true
    }

    /// Sideways move or rotation: restart a running lock timer, or cancel it
    /// when the piece slid off its surface.
    fn after_move(&mut self) {
        let grounded = self.active.is_some_and(|p| p.is_grounded(&self.board));
        if grounded {
            self.lock.reset();
        }
        self.settle();
    }

    /// Recompute Falling/Locking from whether the piece rests on something.
    fn settle(&mut self) {
        let Some(active) = self.active else {
            return;
        };
        if active.is_grounded(&self.board) {
            self.lock.start(active.bottom());
            self.phase = Phase::Locking;
        } else {
            self.lock.cancel();
            self.phase = Phase::Falling;
        }
    }

    fn spawn_position(&self, kind: PieceKind) -> Piece {
        let shape = get_shape(kind, Rotation::North);
        let (min_x, max_x, min_y, _) = shape_bounds(&shape);
        let piece_width = max_x - min_x + 1;
        let free = self.board.width() as i16 - piece_width;
        let column = self
            .spawn_column
            .map(|c| c.min(free))
            .unwrap_or(free / 2)
            .max(0);
        Piece {
            kind,
            rotation: Rotation::North,
            x: column - min_x,
            y: self.spawn_row - min_y,
        }
    }

    fn spawn(&mut self) -> StepOutcome {
        let kind = self.queue.draw();
        let piece = self.spawn_position(kind);
        self.lock = LockTimer::default();

        if !piece.is_valid(&self.board) {
            self.active = None;
            self.phase = Phase::GameOver;
            log::info!(
                "game over: {} blocked at spawn (score {}, lines {})",
                kind.as_str(),
                self.score,
                self.lines
            );
            return StepOutcome::ToppedOut;
        }

        self.active = Some(piece);
        self.piece_id = self.piece_id.wrapping_add(1);
        self.settle();
        StepOutcome::Spawned(kind)
    }

    fn commit(&mut self) -> StepOutcome {
        let Some(active) = self.active.take() else {
            return StepOutcome::Idle;
        };
        self.lock = LockTimer::default();

        if !self
            .board
            .lock_piece(&active.shape(), active.x, active.y, active.kind)
        {
            // Only reachable if the board changed under the piece.
            log::error!("active {} overlaps the board; ending episode", active.kind.as_str());
            self.phase = Phase::GameOver;
            return StepOutcome::ToppedOut;
        }

        let rows = self.board.clear_full_rows();
        let score = calculate_line_score(rows.len(), self.level);
        self.score = self.score.saturating_add(score);
        self.lines = self.lines.saturating_add(rows.len() as u32);
        self.level = level_for_lines(self.lines);
        self.phase = Phase::Cleared;

        log::debug!(
            "locked {} at ({}, {}), cleared {} rows",
            active.kind.as_str(),
            active.x,
            active.y,
            rows.len()
        );

        StepOutcome::Committed(LockEvent {
            kind: active.kind,
            rows,
            score,
        })
    }

    /// Copy the observable state into `out`, reusing its allocations.
    pub fn snapshot_into(&self, out: &mut BoardSnapshot) {
        out.width = self.board.width();
        out.height = self.board.height();
        self.board.write_color_ids(&mut out.cells);
        out.active = self.active.map(ActiveSnapshot::from);
        out.ghost_y = self.ghost_y();
        out.next = self.next_piece();
        out.phase = self.phase;
        out.paused = self.paused;
        out.episode = self.episode;
        out.piece_id = self.piece_id;
        out.steps = self.steps;
        out.score = self.score;
        out.lines = self.lines;
        out.level = self.level;
        out.lock_progress = self.lock_progress();
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let mut s = BoardSnapshot::default();
        self.snapshot_into(&mut s);
        s
    }

    #[cfg(test)]
    pub(crate) fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }
}
