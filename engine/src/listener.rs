use minesweeper_common::{models::Pos, protocol::GameEvent};
use tokio::sync::mpsc;

/// Receives every state change of a game.
///
/// Callbacks are plain notifications. Ticks arrive from the timer task, so
/// implementations must be shareable across threads, and they must not call
/// back into the game that notified them.
pub trait MinesweeperListener: Send + Sync {
    /// Reserved, the engine never emits it.
    fn already_clicked(&self);

    fn square_revealed(&self, pos: Pos, adjacent: u8);

    fn square_flagged(&self, pos: Pos);

    /// The square went from flagged or questioned back to unmarked.
    fn square_unmarked(&self, pos: Pos);

    fn square_questioned(&self, pos: Pos);

    /// The player opened a mine at `pos`. The game is over.
    fn mine_revealed(&self, pos: Pos);

    /// At the end of a lost game, `pos` held an unflagged mine.
    fn square_bomb(&self, pos: Pos);

    /// At the end of a lost game, `pos` was flagged but held no mine.
    fn incorrect_flag(&self, pos: Pos);

    fn total_flags_changed(&self, mines_unflagged: i64);

    fn game_won(&self);

    fn game_lost(&self);

    /// Once per tick interval while a game is running.
    fn tick(&self);

    /// A command has been fully resolved, cascades included.
    fn move_finished(&self);
}

/// Forwards every callback as a [`GameEvent`]. A closed receiver is ignored.
impl MinesweeperListener for mpsc::UnboundedSender<GameEvent> {
    fn already_clicked(&self) {
        let _ = self.send(GameEvent::AlreadyClicked);
    }

    fn square_revealed(&self, pos: Pos, adjacent: u8) {
        let _ = self.send(GameEvent::SquareRevealed { pos, adjacent });
    }

    fn square_flagged(&self, pos: Pos) {
        let _ = self.send(GameEvent::SquareFlagged { pos });
    }

    fn square_unmarked(&self, pos: Pos) {
        let _ = self.send(GameEvent::SquareUnmarked { pos });
    }

    fn square_questioned(&self, pos: Pos) {
        let _ = self.send(GameEvent::SquareQuestioned { pos });
    }

    fn mine_revealed(&self, pos: Pos) {
        let _ = self.send(GameEvent::MineRevealed { pos });
    }

    fn square_bomb(&self, pos: Pos) {
        let _ = self.send(GameEvent::SquareBomb { pos });
    }

    fn incorrect_flag(&self, pos: Pos) {
        let _ = self.send(GameEvent::IncorrectFlag { pos });
    }

    fn total_flags_changed(&self, mines_unflagged: i64) {
        let _ = self.send(GameEvent::TotalFlagsChanged { mines_unflagged });
    }

    fn game_won(&self) {
        let _ = self.send(GameEvent::GameWon);
    }

    fn game_lost(&self) {
        let _ = self.send(GameEvent::GameLost);
    }

    fn tick(&self) {
        let _ = self.send(GameEvent::Tick);
    }

    fn move_finished(&self) {
        let _ = self.send(GameEvent::MoveFinished);
    }
}

/// Listener for headless games nobody watches.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl MinesweeperListener for NoopListener {
    fn already_clicked(&self) {}
    fn square_revealed(&self, _pos: Pos, _adjacent: u8) {}
    fn square_flagged(&self, _pos: Pos) {}
    fn square_unmarked(&self, _pos: Pos) {}
    fn square_questioned(&self, _pos: Pos) {}
    fn mine_revealed(&self, _pos: Pos) {}
    fn square_bomb(&self, _pos: Pos) {}
    fn incorrect_flag(&self, _pos: Pos) {}
    fn total_flags_changed(&self, _mines_unflagged: i64) {}
    fn game_won(&self) {}
    fn game_lost(&self) {}
    fn tick(&self) {}
    fn move_finished(&self) {}
}
