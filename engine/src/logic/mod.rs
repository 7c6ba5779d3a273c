use std::{sync::Arc, time::Duration};

use minesweeper_common::models::{BoardView, Cell, GameParams, MarkState, Pos};
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    config::EngineConfig,
    data::{Board, Square},
    error::Result,
    listener::MinesweeperListener,
    timer::GameTimer,
};

/// One game of minesweeper.
///
/// The board stays empty until the first reveal, which lays the mines around
/// the clicked square and starts the timer. The game then runs until every
/// non-mine square is revealed or a single mine is.
pub struct Game {
    board: Board,
    // kept apart so that "not won" is never read as "lost" mid-game
    won: bool,
    lost: bool,
    mines_unflagged: i64,
    unrevealed_non_mines: usize,
    question_mode: bool,
    seed: Option<u64>,
    listener: Arc<dyn MinesweeperListener>,
    timer: GameTimer,
}

impl Game {
    pub fn new(params: GameParams, listener: Arc<dyn MinesweeperListener>) -> Result<Self> {
        Self::with_config(params, listener, &EngineConfig::default())
    }

    #[instrument(level = "trace", skip(listener))]
    pub fn with_config(
        params: GameParams,
        listener: Arc<dyn MinesweeperListener>,
        config: &EngineConfig,
    ) -> Result<Self> {
        let board = Board::new(params)?;
        info!(
            "Creating new game: {}x{} with {} mines",
            params.width, params.height, params.mines
        );
        Ok(Self::with_board(board, listener, config))
    }

    /// Plays on a board prepared by the caller, populated or not.
    pub fn with_board(
        board: Board,
        listener: Arc<dyn MinesweeperListener>,
        config: &EngineConfig,
    ) -> Self {
        // an unpopulated board reports every square as a non-mine
        let unrevealed_non_mines = if board.is_populated() {
            board
                .squares()
                .iter()
                .filter(|square| !square.is_mine() && !square.is_revealed())
                .count()
        } else {
            board.params().cells() - board.mines()
        };
        let flagged = board.squares().iter().filter(|s| s.is_flagged()).count();

        Self {
            mines_unflagged: board.mines() as i64 - flagged as i64,
            unrevealed_non_mines,
            board,
            won: false,
            lost: false,
            question_mode: config.question_mode,
            seed: config.seed,
            timer: GameTimer::new(config.tick_interval, listener.clone()),
            listener,
        }
    }

    /// Opens the square at `pos`, cascading over empty regions. The first
    /// reveal of a game populates the board and starts the timer.
    #[instrument(level = "trace", skip(self), fields(x = pos.x, y = pos.y))]
    pub fn reveal(&mut self, pos: Pos) {
        if !self.board.contains(pos) {
            debug!("Ignoring reveal outside the board at {}", pos);
            return;
        }

        if !self.board.is_populated() {
            self.populate(pos);
        }
        if !self.timer.is_started() && !self.is_finished() {
            self.timer.start();
        }

        self.reveal_square(pos);
        self.listener.move_finished();
    }

    fn populate(&mut self, safe: Pos) {
        match self.seed {
            Some(seed) => self
                .board
                .populate_with_rng(safe, &mut StdRng::seed_from_u64(seed)),
            None => self.board.populate(safe),
        }
    }

    fn reveal_square(&mut self, pos: Pos) {
        if self.is_finished() {
            trace!("Ignoring reveal on finished game at {}", pos);
            return;
        }

        let Some(square) = self.board.square_mut(pos) else {
            return;
        };
        if square.is_revealed() || square.is_flagged() {
            trace!("Nothing to reveal at {}", pos);
            return;
        }

        if square.is_mine() {
            square.reveal();
            warn!("Mine revealed at {} - game over!", pos);
            self.listener.mine_revealed(pos);
            self.lose(pos);
            return;
        }

        let adjacent = square.adjacent_mines();
        if adjacent > 0 {
            square.reveal();
            self.unrevealed_non_mines -= 1;
            self.listener.square_revealed(pos, adjacent);
        } else {
            self.flood_fill(pos);
        }

        if self.unrevealed_non_mines == 0 {
            self.win();
        }
    }

    /// Reveals the connected region of empty squares around `origin` and the
    /// numbered squares bordering it. Marked squares stop the cascade.
    fn flood_fill(&mut self, origin: Pos) {
        let mut pending = vec![origin];
        let mut revealed = 0usize;

        while let Some(pos) = pending.pop() {
            let Some(square) = self.board.square_mut(pos) else {
                continue;
            };
            if square.is_revealed() || (pos != origin && square.mark() != MarkState::Unmarked) {
                continue;
            }
            debug_assert!(!square.is_mine(), "cascade reached a mine at {pos}");

            square.reveal();
            let adjacent = square.adjacent_mines();
            self.unrevealed_non_mines -= 1;
            revealed += 1;
            self.listener.square_revealed(pos, adjacent);

            if adjacent == 0 {
                pending.extend(self.board.neighbours(pos));
            }
        }

        debug!("Cascade from {} revealed {} squares", origin, revealed);
    }

    /// Reveals every neighbour of a satisfied square. Does nothing at all
    /// unless the flags around `pos` match its mine count.
    #[instrument(level = "trace", skip(self), fields(x = pos.x, y = pos.y))]
    pub fn chord(&mut self, pos: Pos) {
        let Some(square) = self.board.square(pos) else {
            debug!("Ignoring chord outside the board at {}", pos);
            return;
        };
        if !square.is_revealed() || square.is_mine() || !self.board.is_satisfied(pos) {
            trace!("Square {} cannot be chorded", pos);
            return;
        }

        let neighbours: Vec<Pos> = self.board.neighbours(pos).collect();
        for neighbour in neighbours {
            self.reveal_square(neighbour);
        }

        self.listener.move_finished();
    }

    /// Cycles the mark on an unrevealed square: unmarked, flagged, then
    /// questioned when question mode is on, and back to unmarked.
    #[instrument(level = "trace", skip(self), fields(x = pos.x, y = pos.y))]
    pub fn toggle_mark(&mut self, pos: Pos) {
        if self.is_finished() {
            debug!("Ignoring mark on finished game at {}", pos);
            return;
        }

        let question_mode = self.question_mode;
        let Some(square) = self.board.square_mut(pos) else {
            debug!("Ignoring mark outside the board at {}", pos);
            return;
        };

        let was_flagged = square.is_flagged();
        let Some(mark) = square.toggle_mark(question_mode) else {
            trace!("Ignoring mark on revealed square {}", pos);
            return;
        };

        if was_flagged {
            self.mines_unflagged += 1;
        }
        match mark {
            MarkState::Flagged => {
                self.mines_unflagged -= 1;
                self.listener.square_flagged(pos);
            }
            MarkState::Questioned => self.listener.square_questioned(pos),
            MarkState::Unmarked => self.listener.square_unmarked(pos),
        }
        debug!("Square {} is now {:?}", pos, mark);

        self.listener.total_flags_changed(self.mines_unflagged);
    }

    /// Flags `pos` whatever its current mark. A square that is already
    /// flagged is left alone.
    #[instrument(level = "trace", skip(self), fields(x = pos.x, y = pos.y))]
    pub fn set_flagged(&mut self, pos: Pos) {
        if self.is_finished() {
            return;
        }
        let Some(square) = self.board.square_mut(pos) else {
            return;
        };
        if !square.set_flagged() {
            return;
        }

        self.mines_unflagged -= 1;
        self.listener.square_flagged(pos);
        self.listener.total_flags_changed(self.mines_unflagged);
    }

    fn lose(&mut self, trigger: Pos) {
        self.timer.stop();
        self.lost = true;

        for square in self.board.squares() {
            if square.pos() == trigger {
                continue;
            }
            if square.is_flagged() && !square.is_mine() {
                self.listener.incorrect_flag(square.pos());
            } else if square.is_mine() && !square.is_flagged() {
                self.listener.square_bomb(square.pos());
            }
        }

        info!("Game lost after {:?}", self.timer.elapsed());
        self.listener.game_lost();
    }

    fn win(&mut self) {
        self.timer.stop();
        self.won = true;

        for square in self.board.squares() {
            if square.is_mine() && !square.is_flagged() {
                self.listener.square_flagged(square.pos());
            }
        }

        info!("Game won after {:?}", self.timer.elapsed());
        self.listener.game_won();
    }

    pub fn stop_timer(&mut self) {
        self.timer.stop();
    }

    pub fn has_won(&self) -> bool {
        self.won
    }

    pub fn has_died(&self) -> bool {
        self.lost
    }

    pub fn is_finished(&self) -> bool {
        self.won || self.lost
    }

    pub fn square(&self, pos: Pos) -> Option<&Square> {
        self.board.square(pos)
    }

    pub fn squares(&self) -> &[Square] {
        self.board.squares()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn params(&self) -> GameParams {
        self.board.params()
    }

    /// Mines minus flags placed; negative when the player over-flags.
    pub fn mines_unflagged(&self) -> i64 {
        self.mines_unflagged
    }

    pub fn unrevealed_non_mines(&self) -> usize {
        self.unrevealed_non_mines
    }

    pub fn question_mode(&self) -> bool {
        self.question_mode
    }

    pub fn set_question_mode(&mut self, enabled: bool) {
        self.question_mode = enabled;
    }

    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    pub fn listener(&self) -> &Arc<dyn MinesweeperListener> {
        &self.listener
    }

    fn cell(&self, square: &Square) -> Cell {
        match square {
            s if self.lost && s.is_mine() && !s.is_flagged() => Cell::Bomb,
            s if self.won && s.is_mine() => Cell::Flagged,
            s => s.into(),
        }
    }

    pub fn view(&self) -> BoardView {
        BoardView {
            width: self.board.width(),
            height: self.board.height(),
            mines: self.board.mines(),
            mines_unflagged: self.mines_unflagged,
            won: self.won,
            lost: self.lost,
            field: self
                .board
                .rows()
                .map(|row| row.iter().map(|square| self.cell(square)).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use minesweeper_common::protocol::GameEvent;
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::Error;

    fn game_on(board: Board) -> (Game, mpsc::UnboundedReceiver<GameEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let game = Game::with_board(board, Arc::new(sender), &EngineConfig::default());
        (game, receiver)
    }

    fn events(receiver: &mut mpsc::UnboundedReceiver<GameEvent>) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn construction_validates_params() {
        for params in [
            GameParams::new(0, 8, 1),
            GameParams::new(8, 0, 1),
            GameParams::new(2, 2, 5),
        ] {
            let result = Game::new(params, Arc::new(crate::NoopListener));
            assert!(matches!(result, Err(Error::InvalidConfiguration { .. })));
        }

        let game = Game::new(GameParams::new(8, 8, 10), Arc::new(crate::NoopListener)).unwrap();
        assert_eq!(game.mines_unflagged(), 10);
        assert_eq!(game.unrevealed_non_mines(), 54);
        assert!(!game.board().is_populated());
        assert!(!game.is_finished());
    }

    #[test]
    fn flags_already_on_the_board_are_counted() {
        let mut board = Board::with_mines(3, 3, &[Pos::new(0, 0), Pos::new(2, 2)]).unwrap();
        board.square_mut(Pos::new(0, 0)).unwrap().set_flagged();
        board.square_mut(Pos::new(1, 0)).unwrap().set_flagged();
        board.square_mut(Pos::new(1, 1)).unwrap().set_flagged();

        let (mut game, mut receiver) = game_on(board);
        assert_eq!(game.mines_unflagged(), -1);

        game.toggle_mark(Pos::new(1, 1));
        assert_eq!(
            events(&mut receiver),
            vec![
                GameEvent::SquareUnmarked {
                    pos: Pos::new(1, 1)
                },
                GameEvent::TotalFlagsChanged { mines_unflagged: 0 },
            ]
        );
    }

    #[test]
    fn numbered_square_reveals_alone() {
        let board = Board::with_mines(3, 3, &[Pos::new(0, 0)]).unwrap();
        let (mut game, mut receiver) = game_on(board);

        game.reveal(Pos::new(1, 1));
        assert_eq!(
            events(&mut receiver),
            vec![
                GameEvent::SquareRevealed {
                    pos: Pos::new(1, 1),
                    adjacent: 1
                },
                GameEvent::MoveFinished,
            ]
        );
        assert_eq!(game.unrevealed_non_mines(), 7);
    }

    #[test]
    fn questioned_square_can_still_be_opened() {
        let board = Board::with_mines(3, 1, &[Pos::new(2, 0)]).unwrap();
        let (mut game, mut receiver) = game_on(board);
        game.set_question_mode(true);
        game.toggle_mark(Pos::new(0, 0));
        game.toggle_mark(Pos::new(0, 0));
        assert!(game.square(Pos::new(0, 0)).unwrap().is_questioned());
        events(&mut receiver);

        game.reveal(Pos::new(0, 0));
        let square = game.square(Pos::new(0, 0)).unwrap();
        assert!(square.is_revealed());
        assert!(!square.is_questioned());
        assert!(game.has_won());
    }

    #[test]
    fn flagged_square_is_protected() {
        let board = Board::with_mines(2, 1, &[Pos::new(0, 0)]).unwrap();
        let (mut game, mut receiver) = game_on(board);
        game.toggle_mark(Pos::new(0, 0));
        events(&mut receiver);

        game.reveal(Pos::new(0, 0));
        assert_eq!(events(&mut receiver), vec![GameEvent::MoveFinished]);
        assert!(!game.has_died());
    }

    #[test]
    fn invalid_coordinates_are_silent() {
        let board = Board::with_mines(2, 2, &[Pos::new(0, 0)]).unwrap();
        let (mut game, mut receiver) = game_on(board);

        game.reveal(Pos::new(2, 0));
        game.chord(Pos::new(0, 5));
        game.toggle_mark(Pos::new(9, 9));
        game.set_flagged(Pos::new(2, 2));

        assert!(events(&mut receiver).is_empty());
        assert!(game.square(Pos::new(2, 0)).is_none());
    }

    #[test]
    fn toggle_mark_keeps_flag_count() {
        let board = Board::with_mines(3, 3, &[Pos::new(0, 0), Pos::new(2, 2)]).unwrap();
        let (mut game, mut receiver) = game_on(board);
        game.set_question_mode(true);
        let pos = Pos::new(1, 1);

        game.toggle_mark(pos);
        game.toggle_mark(pos);
        game.toggle_mark(pos);

        assert_eq!(
            events(&mut receiver),
            vec![
                GameEvent::SquareFlagged { pos },
                GameEvent::TotalFlagsChanged { mines_unflagged: 1 },
                GameEvent::SquareQuestioned { pos },
                GameEvent::TotalFlagsChanged { mines_unflagged: 2 },
                GameEvent::SquareUnmarked { pos },
                GameEvent::TotalFlagsChanged { mines_unflagged: 2 },
            ]
        );
    }

    #[test]
    fn question_mode_off_skips_question_mark() {
        let board = Board::with_mines(2, 2, &[Pos::new(0, 0)]).unwrap();
        let (mut game, mut receiver) = game_on(board);
        let pos = Pos::new(1, 1);

        game.toggle_mark(pos);
        game.toggle_mark(pos);
        assert_eq!(
            events(&mut receiver),
            vec![
                GameEvent::SquareFlagged { pos },
                GameEvent::TotalFlagsChanged { mines_unflagged: 0 },
                GameEvent::SquareUnmarked { pos },
                GameEvent::TotalFlagsChanged { mines_unflagged: 1 },
            ]
        );
    }

    #[test]
    fn set_flagged_is_idempotent() {
        let board = Board::with_mines(2, 2, &[Pos::new(0, 0)]).unwrap();
        let (mut game, mut receiver) = game_on(board);
        let pos = Pos::new(0, 0);

        game.set_flagged(pos);
        game.set_flagged(pos);

        assert_eq!(
            events(&mut receiver),
            vec![
                GameEvent::SquareFlagged { pos },
                GameEvent::TotalFlagsChanged { mines_unflagged: 0 },
            ]
        );
        assert!(game.square(pos).unwrap().is_flagged());
    }

    #[test]
    fn marking_a_revealed_square_does_nothing() {
        let board = Board::with_mines(3, 3, &[Pos::new(0, 0)]).unwrap();
        let (mut game, mut receiver) = game_on(board);
        game.reveal(Pos::new(1, 1));
        events(&mut receiver);

        game.toggle_mark(Pos::new(1, 1));
        game.set_flagged(Pos::new(1, 1));
        assert!(events(&mut receiver).is_empty());
        assert_eq!(game.mines_unflagged(), 1);
    }

    #[test]
    fn view_shows_mines_after_a_loss() {
        let board = Board::with_mines(2, 2, &[Pos::new(0, 0), Pos::new(1, 1)]).unwrap();
        let (mut game, _receiver) = game_on(board);
        game.toggle_mark(Pos::new(1, 0));
        game.reveal(Pos::new(0, 0));

        let view = game.view();
        assert!(view.lost);
        assert_eq!(view.cell(Pos::new(0, 0)), Some(Cell::Bomb));
        assert_eq!(view.cell(Pos::new(1, 1)), Some(Cell::Bomb));
        assert_eq!(view.cell(Pos::new(1, 0)), Some(Cell::Flagged));
        assert_eq!(view.cell(Pos::new(0, 1)), Some(Cell::Hidden));
    }

    #[test]
    fn seeded_games_lay_the_same_mines() {
        let config = EngineConfig {
            seed: Some(99),
            ..EngineConfig::default()
        };
        let layout = |game: &Game| -> Vec<bool> {
            game.squares().iter().map(Square::is_mine).collect()
        };

        let mut first = Game::with_config(
            GameParams::new(16, 16, 40),
            Arc::new(crate::NoopListener),
            &config,
        )
        .unwrap();
        let mut second = Game::with_config(
            GameParams::new(16, 16, 40),
            Arc::new(crate::NoopListener),
            &config,
        )
        .unwrap();
        first.reveal(Pos::new(3, 3));
        second.reveal(Pos::new(3, 3));

        assert_eq!(layout(&first), layout(&second));
    }
}
