// Core type definitions: ids, goods, positions, modes

use serde::{Deserialize, Serialize};

// === TYPE ALIASES ===

/// Stable agent identifier. Agents are created at init, never destroyed,
/// and iterated in ascending id order inside every phase.
pub type AgentId = u32;

pub type Tick = u64;

/// Prices and utility values stay in floating point; inventories do not.
pub type Price = f64;

// === GOODS ===

/// The two barter goods. Everything in the engine is priced as
/// "units of B per unit of A".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Good {
    A,
    B,
}

impl Good {
    pub fn label(self) -> &'static str {
        match self {
            Good::A => "A",
            Good::B => "B",
        }
    }
}

// === POSITION ===

/// A grid cell coordinate. The grid is finite: `0 <= x < W`, `0 <= y < H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance, the only metric the engine uses.
    pub fn distance(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

// === MODE ===

/// Which phase systems run this tick. `Both` enables trade and forage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Trade,
    Forage,
    Both,
}

impl Mode {
    pub fn trade_enabled(self) -> bool {
        matches!(self, Mode::Trade | Mode::Both)
    }

    pub fn forage_enabled(self) -> bool {
        matches!(self, Mode::Forage | Mode::Both)
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Trade => "trade",
            Mode::Forage => "forage",
            Mode::Both => "both",
        }
    }
}

/// Half-open interval `[start, end)` during which `mode` is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeInterval {
    pub start: Tick,
    pub end: Tick,
    pub mode: Mode,
}

/// External mode schedule. Ticks not covered by any interval run `Both`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeSchedule {
    pub intervals: Vec<ModeInterval>,
}

impl ModeSchedule {
    pub fn always(mode: Mode) -> Self {
        Self {
            intervals: vec![ModeInterval {
                start: 0,
                end: Tick::MAX,
                mode,
            }],
        }
    }

    pub fn mode_at(&self, tick: Tick) -> Mode {
        self.intervals
            .iter()
            .find(|iv| iv.start <= tick && tick < iv.end)
            .map(|iv| iv.mode)
            .unwrap_or(Mode::Both)
    }
}
