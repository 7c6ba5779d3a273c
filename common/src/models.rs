use std::fmt;

use serde::{Deserialize, Serialize};

/// What a front-end is allowed to see of a single square.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "state")]
pub enum Cell {
    #[serde(rename = "hidden")]
    Hidden,
    #[serde(rename = "marked")]
    Marked,
    #[serde(rename = "flagged")]
    Flagged,
    #[serde(rename = "revealed")]
    Revealed { adjacent: u8 },
    #[serde(rename = "bomb")]
    Bomb,
}

/// Mark a player has put on an unrevealed square.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq, Hash)]
pub enum MarkState {
    #[default]
    #[serde(rename = "unmarked")]
    Unmarked,
    #[serde(rename = "flagged")]
    Flagged,
    #[serde(rename = "questioned")]
    Questioned,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Built-in board presets.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Difficulty {
    #[serde(rename = "beginner")]
    Beginner,
    #[serde(rename = "intermediate")]
    Intermediate,
    #[serde(rename = "expert")]
    Expert,
}

impl Difficulty {
    pub const fn params(self) -> GameParams {
        match self {
            Difficulty::Beginner => GameParams::new(8, 8, 10),
            Difficulty::Intermediate => GameParams::new(16, 16, 40),
            Difficulty::Expert => GameParams::new(30, 16, 99),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameParams {
    pub width: usize,
    pub height: usize,
    pub mines: usize,
}

impl GameParams {
    pub const fn new(width: usize, height: usize, mines: usize) -> Self {
        Self {
            width,
            height,
            mines,
        }
    }

    pub const fn cells(&self) -> usize {
        self.width * self.height
    }
}

impl Default for GameParams {
    fn default() -> Self {
        Difficulty::Beginner.params()
    }
}

impl From<Difficulty> for GameParams {
    fn from(value: Difficulty) -> Self {
        value.params()
    }
}

/// Point-in-time picture of a game, laid out row by row.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct BoardView {
    pub width: usize,
    pub height: usize,
    pub mines: usize,
    pub mines_unflagged: i64,
    pub won: bool,
    pub lost: bool,
    pub field: Vec<Vec<Cell>>,
}

impl BoardView {
    pub fn cell(&self, pos: Pos) -> Option<Cell> {
        self.field.get(pos.y)?.get(pos.x).copied()
    }

    pub fn is_finished(&self) -> bool {
        self.won || self.lost
    }
}
