//! Shared types - plain data shared by every blockbeat crate
//!
//! Everything here is a pure data structure with no external dependencies so it
//! can be used by the simulation core, the control protocol and the renderers.
//!
//! # Defaults
//!
//! Timing values are in seconds and mirror the stock configuration file:
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `DEFAULT_GRAVITY_INTERVAL_SECS` | 1.0 | Seconds per gravity step |
//! | `DEFAULT_LOCK_DELAY_SECS` | 0.5 | Grace period before a resting piece commits |
//! | `DEFAULT_BPM` | 120 | Tempo of the beat clock |
//! | `DEFAULT_MAX_CATCH_UP_STEPS` | 8 | Gravity steps allowed in a single tick |
//! | `DEFAULT_FPS` | 30 | Output frame rate |
//! | `DEFAULT_FRAME_LIMIT` | 900 | Frames written before recording completes |
//!
//! # Examples
//!
//! ```
//! use blockbeat_types::{GameAction, ParamName, PieceKind, Rotation};
//!
//! assert_eq!(PieceKind::from_str("t"), Some(PieceKind::T));
//! assert_eq!(Rotation::North.rotate_cw(), Rotation::East);
//! assert_eq!(GameAction::from_str("hardDrop"), Some(GameAction::HardDrop));
//! assert_eq!(ParamName::from_str("gravity_interval"), Some(ParamName::GravityInterval));
//! ```

/// Default board width in cells
pub const DEFAULT_BOARD_WIDTH: u16 = 10;

/// Default board height in cells
pub const DEFAULT_BOARD_HEIGHT: u16 = 20;

/// Default seconds per gravity step
pub const DEFAULT_GRAVITY_INTERVAL_SECS: f64 = 1.0;

/// Default lock delay in seconds
pub const DEFAULT_LOCK_DELAY_SECS: f64 = 0.5;

/// Default tempo in beats per minute
pub const DEFAULT_BPM: f64 = 120.0;

/// Maximum gravity steps a single tick may produce before debt is dropped
pub const DEFAULT_MAX_CATCH_UP_STEPS: u32 = 8;

/// Maximum number of lock timer resets per piece (15)
pub const LOCK_RESET_LIMIT: u8 = 15;

/// Default output frame rate
pub const DEFAULT_FPS: u32 = 30;

/// Default number of frames written before recording completes
pub const DEFAULT_FRAME_LIMIT: u64 = 900;

/// Default UDP port for live control
pub const DEFAULT_OSC_PORT: u16 = 9000;

/// Line clear scoring table (Classic Nintendo scoring)
///
/// Points are multiplied by (level + 1).
pub const LINE_SCORES: [u32; 5] = [0, 40, 100, 300, 1200];

/// Lines needed per level
pub const LINES_PER_LEVEL: u32 = 10;

/// The seven tetromino piece kinds
///
/// The kind doubles as the color identifier stored in board cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceKind {
    /// All kinds in bag order
    pub const ALL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
    ];

    /// Parse piece kind from string (case-insensitive)
    ///
    /// ```
    /// use blockbeat_types::PieceKind;
    ///
    /// assert_eq!(PieceKind::from_str("i"), Some(PieceKind::I));
    /// assert_eq!(PieceKind::from_str("O"), Some(PieceKind::O));
    /// assert_eq!(PieceKind::from_str("unknown"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "i" => Some(PieceKind::I),
            "o" => Some(PieceKind::O),
            "t" => Some(PieceKind::T),
            "s" => Some(PieceKind::S),
            "z" => Some(PieceKind::Z),
            "j" => Some(PieceKind::J),
            "l" => Some(PieceKind::L),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PieceKind::I => "i",
            PieceKind::O => "o",
            PieceKind::T => "t",
            PieceKind::S => "s",
            PieceKind::Z => "z",
            PieceKind::J => "j",
            PieceKind::L => "l",
        }
    }

    /// Stable color identifier (1..=7). 0 is reserved for empty cells.
    pub fn color_id(&self) -> u8 {
        match self {
            PieceKind::I => 1,
            PieceKind::O => 2,
            PieceKind::T => 3,
            PieceKind::S => 4,
            PieceKind::Z => 5,
            PieceKind::J => 6,
            PieceKind::L => 7,
        }
    }

    /// Inverse of [`PieceKind::color_id`].
    pub fn from_color_id(id: u8) -> Option<Self> {
        match id {
            1..=7 => Some(Self::ALL[(id - 1) as usize]),
            _ => None,
        }
    }
}

/// Rotation states following the Super Rotation System (SRS)
///
/// The rotation cycle goes: North → East → South → West → North
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    North,
    East,
    South,
    West,
}

impl Rotation {
    /// Rotate clockwise (90°)
    ///
    /// ```
    /// use blockbeat_types::Rotation;
    ///
    /// assert_eq!(Rotation::North.rotate_cw(), Rotation::East);
    /// assert_eq!(Rotation::West.rotate_cw(), Rotation::North);
    /// ```
    pub fn rotate_cw(&self) -> Self {
        match self {
            Rotation::North => Rotation::East,
            Rotation::East => Rotation::South,
            Rotation::South => Rotation::West,
            Rotation::West => Rotation::North,
        }
    }

    /// Rotate counter-clockwise
    pub fn rotate_ccw(&self) -> Self {
        match self {
            Rotation::North => Rotation::West,
            Rotation::West => Rotation::South,
            Rotation::South => Rotation::East,
            Rotation::East => Rotation::North,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rotation::North => "north",
            Rotation::East => "east",
            Rotation::South => "south",
            Rotation::West => "west",
        }
    }
}

/// Player actions applied between gravity steps
///
/// They arrive through the control channel (`/action <name>`), never from the
/// network thread directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameAction {
    /// Move piece one cell left
    MoveLeft,
    /// Move piece one cell right
    MoveRight,
    /// Drop piece one cell down
    SoftDrop,
    /// Drop piece to the lowest valid row and start locking
    HardDrop,
    /// Rotate piece 90° clockwise
    RotateCw,
    /// Rotate piece 90° counter-clockwise
    RotateCcw,
    /// Toggle pause state
    Pause,
    /// Restart the game (also leaves game over)
    Restart,
}

impl GameAction {
    /// Parse action from string (case-insensitive camelCase)
    ///
    /// ```
    /// use blockbeat_types::GameAction;
    ///
    /// assert_eq!(GameAction::from_str("moveLeft"), Some(GameAction::MoveLeft));
    /// assert_eq!(GameAction::from_str("ROTATECW"), Some(GameAction::RotateCw));
    /// assert_eq!(GameAction::from_str("hold"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "moveleft" | "left" => Some(GameAction::MoveLeft),
            "moveright" | "right" => Some(GameAction::MoveRight),
            "softdrop" => Some(GameAction::SoftDrop),
            "harddrop" | "drop" => Some(GameAction::HardDrop),
            "rotatecw" | "rotate" => Some(GameAction::RotateCw),
            "rotateccw" => Some(GameAction::RotateCcw),
            "pause" => Some(GameAction::Pause),
            "restart" => Some(GameAction::Restart),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameAction::MoveLeft => "moveLeft",
            GameAction::MoveRight => "moveRight",
            GameAction::SoftDrop => "softDrop",
            GameAction::HardDrop => "hardDrop",
            GameAction::RotateCw => "rotateCw",
            GameAction::RotateCcw => "rotateCcw",
            GameAction::Pause => "pause",
            GameAction::Restart => "restart",
        }
    }
}

/// Live-tunable parameters (the control allow-list)
///
/// Anything not listed here is rejected by the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamName {
    /// Seconds per gravity step
    GravityInterval,
    /// Seconds a resting piece waits before committing
    LockDelay,
    /// Beats per minute of the beat clock
    Bpm,
    /// Subdivision used by the tempo coupling
    BeatDivision,
    /// Outline width of filled cells, in texture pixels
    CellStrokeWeight,
    /// Outline width of empty grid cells, in texture pixels
    GridStrokeWeight,
    /// Width of the beat ring, in texture pixels
    RingStrokeWeight,
}

impl ParamName {
    pub const COUNT: usize = 7;

    pub const ALL: [ParamName; Self::COUNT] = [
        ParamName::GravityInterval,
        ParamName::LockDelay,
        ParamName::Bpm,
        ParamName::BeatDivision,
        ParamName::CellStrokeWeight,
        ParamName::GridStrokeWeight,
        ParamName::RingStrokeWeight,
    ];

    /// Dense index into [`ParamName::ALL`].
    pub fn index(&self) -> usize {
        match self {
            ParamName::GravityInterval => 0,
            ParamName::LockDelay => 1,
            ParamName::Bpm => 2,
            ParamName::BeatDivision => 3,
            ParamName::CellStrokeWeight => 4,
            ParamName::GridStrokeWeight => 5,
            ParamName::RingStrokeWeight => 6,
        }
    }

    /// Parse a parameter name. Accepts snake_case and camelCase.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "").as_str() {
            "gravityinterval" => Some(ParamName::GravityInterval),
            "lockdelay" => Some(ParamName::LockDelay),
            "bpm" => Some(ParamName::Bpm),
            "beatdivision" => Some(ParamName::BeatDivision),
            "cellstrokeweight" => Some(ParamName::CellStrokeWeight),
            "gridstrokeweight" => Some(ParamName::GridStrokeWeight),
            "ringstrokeweight" => Some(ParamName::RingStrokeWeight),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamName::GravityInterval => "gravity_interval",
            ParamName::LockDelay => "lock_delay",
            ParamName::Bpm => "bpm",
            ParamName::BeatDivision => "beat_division",
            ParamName::CellStrokeWeight => "cell_stroke_weight",
            ParamName::GridStrokeWeight => "grid_stroke_weight",
            ParamName::RingStrokeWeight => "ring_stroke_weight",
        }
    }
}

/// A cell on the game board
///
/// - `None`: Empty cell
/// - `Some(PieceKind)`: Cell filled with the specified piece kind
pub type Cell = Option<PieceKind>;
