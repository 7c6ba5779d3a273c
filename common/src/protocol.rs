use serde::{Deserialize, Serialize};

use crate::models::{BoardView, GameParams, Pos};

/// A command a front-end sends to a game session.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "action")]
pub enum Command {
    #[serde(rename = "new_game")]
    NewGame {
        #[serde(default)]
        params: GameParams,
    },
    #[serde(rename = "reveal")]
    Reveal { pos: Pos },
    #[serde(rename = "chord")]
    Chord { pos: Pos },
    #[serde(rename = "toggle_mark")]
    ToggleMark { pos: Pos },
    #[serde(rename = "flag")]
    Flag { pos: Pos },
    #[serde(rename = "solve")]
    Solve,
    #[serde(rename = "question_mode")]
    QuestionMode { enabled: bool },
    #[serde(rename = "snapshot")]
    Snapshot,
}

/// Every notification the engine emits while a game is played.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    #[serde(rename = "square_revealed")]
    SquareRevealed { pos: Pos, adjacent: u8 },
    #[serde(rename = "square_flagged")]
    SquareFlagged { pos: Pos },
    #[serde(rename = "square_unmarked")]
    SquareUnmarked { pos: Pos },
    #[serde(rename = "square_questioned")]
    SquareQuestioned { pos: Pos },
    /// The square the player clicked was a mine.
    #[serde(rename = "mine_revealed")]
    MineRevealed { pos: Pos },
    /// An unflagged mine uncovered when the game was lost.
    #[serde(rename = "square_bomb")]
    SquareBomb { pos: Pos },
    #[serde(rename = "incorrect_flag")]
    IncorrectFlag { pos: Pos },
    #[serde(rename = "total_flags_changed")]
    TotalFlagsChanged { mines_unflagged: i64 },
    #[serde(rename = "game_won")]
    GameWon,
    #[serde(rename = "game_lost")]
    GameLost,
    #[serde(rename = "tick")]
    Tick,
    #[serde(rename = "move_finished")]
    MoveFinished,
    #[serde(rename = "already_clicked")]
    AlreadyClicked,
}

/// A line written back to a front-end.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "event")]
    Event { event: GameEvent },
    #[serde(rename = "snapshot")]
    Snapshot { view: BoardView },
    #[serde(rename = "error")]
    Error { message: String },
}
