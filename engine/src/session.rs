use std::sync::Arc;

use minesweeper_common::{
    models::{BoardView, GameParams, Pos},
    protocol::{Command, GameEvent},
};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{info, instrument, warn};

use crate::{
    SharedGame,
    config::EngineConfig,
    error::Result,
    listener::MinesweeperListener,
    logic::Game,
    solver::{SolveReport, Solver},
};

/// The game currently being played plus its solver. Starting a new game
/// swaps both out; listeners stay subscribed across games.
pub struct Session {
    config: EngineConfig,
    listener: Arc<dyn MinesweeperListener>,
    game: SharedGame,
    solver: Solver,
}

impl Session {
    pub fn new(
        params: GameParams,
        listener: Arc<dyn MinesweeperListener>,
        config: EngineConfig,
    ) -> Result<Self> {
        let game: SharedGame = Arc::new(Mutex::new(Game::with_config(
            params,
            listener.clone(),
            &config,
        )?));
        let solver = Solver::new(game.clone(), config.solver_delay);

        Ok(Self {
            config,
            listener,
            game,
            solver,
        })
    }

    /// Creates a session whose events arrive on the returned receiver.
    pub fn subscribe(
        params: GameParams,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<GameEvent>)> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let session = Self::new(params, Arc::new(sender), config)?;
        Ok((session, receiver))
    }

    /// Handle on the current game, for front-ends that need more than the
    /// commands below.
    pub fn game(&self) -> SharedGame {
        self.game.clone()
    }

    /// Replaces the current game. Invalid params leave the current game
    /// untouched.
    #[instrument(level = "trace", skip(self))]
    pub async fn new_game(&mut self, params: GameParams) -> Result<()> {
        let mut fresh = Game::with_config(params, self.listener.clone(), &self.config)?;

        self.solver.cancel();
        {
            let mut old = self.game.lock().await;
            old.stop_timer();
            fresh.set_question_mode(old.question_mode());
        }

        self.game = Arc::new(Mutex::new(fresh));
        self.solver = Solver::new(self.game.clone(), self.config.solver_delay);
        info!(
            "New game started: {}x{} with {} mines",
            params.width, params.height, params.mines
        );
        Ok(())
    }

    pub async fn reveal(&self, pos: Pos) {
        self.game.lock().await.reveal(pos);
    }

    pub async fn chord(&self, pos: Pos) {
        self.game.lock().await.chord(pos);
    }

    pub async fn toggle_mark(&self, pos: Pos) {
        self.game.lock().await.toggle_mark(pos);
    }

    pub async fn set_flagged(&self, pos: Pos) {
        self.game.lock().await.set_flagged(pos);
    }

    pub async fn set_question_mode(&self, enabled: bool) {
        self.game.lock().await.set_question_mode(enabled);
    }

    pub async fn stop_timer(&self) {
        self.game.lock().await.stop_timer();
    }

    pub async fn solve(&self) -> Option<JoinHandle<SolveReport>> {
        self.solver.solve().await
    }

    pub fn is_solving(&self) -> bool {
        self.solver.is_solving()
    }

    pub fn cancel_solve(&self) {
        self.solver.cancel();
    }

    pub async fn has_won(&self) -> bool {
        self.game.lock().await.has_won()
    }

    pub async fn has_died(&self) -> bool {
        self.game.lock().await.has_died()
    }

    pub async fn is_finished(&self) -> bool {
        self.game.lock().await.is_finished()
    }

    pub async fn view(&self) -> BoardView {
        self.game.lock().await.view()
    }

    /// Runs one front-end command. Only `Snapshot` produces a view; a solve
    /// runs on in the background.
    pub async fn execute(&mut self, command: Command) -> Result<Option<BoardView>> {
        match command {
            Command::NewGame { params } => self.new_game(params).await?,
            Command::Reveal { pos } => self.reveal(pos).await,
            Command::Chord { pos } => self.chord(pos).await,
            Command::ToggleMark { pos } => self.toggle_mark(pos).await,
            Command::Flag { pos } => self.set_flagged(pos).await,
            Command::QuestionMode { enabled } => self.set_question_mode(enabled).await,
            Command::Solve => {
                if let Some(task) = self.solve().await {
                    tokio::spawn(async move {
                        if let Err(e) = task.await {
                            warn!("Solver task failed: {}", e);
                        }
                    });
                }
            }
            Command::Snapshot => return Ok(Some(self.view().await)),
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn invalid_new_game_keeps_current_game() {
        let (mut session, _events) =
            Session::subscribe(GameParams::new(4, 4, 2), EngineConfig::default()).unwrap();

        let result = session.new_game(GameParams::new(0, 4, 2)).await;
        assert!(matches!(result, Err(Error::InvalidConfiguration { .. })));
        assert_eq!(session.view().await.width, 4);
    }

    #[tokio::test]
    async fn question_mode_survives_a_new_game() {
        let (mut session, _events) =
            Session::subscribe(GameParams::default(), EngineConfig::default()).unwrap();
        session.set_question_mode(true).await;

        session.new_game(GameParams::new(5, 5, 3)).await.unwrap();
        assert!(session.game().lock().await.question_mode());
    }

    #[test]
    fn fresh_session_is_in_play() {
        let (session, _events) =
            Session::subscribe(GameParams::new(4, 4, 2), EngineConfig::default()).unwrap();

        tokio_test::block_on(async {
            assert!(!session.is_finished().await);
            assert!(!session.has_won().await);
            assert!(!session.has_died().await);
            assert!(!session.is_solving());
            assert_eq!(session.view().await.mines_unflagged, 2);
        });
    }

    #[tokio::test]
    async fn snapshot_is_the_only_command_with_output() {
        let (mut session, _events) =
            Session::subscribe(GameParams::new(3, 3, 0), EngineConfig::default()).unwrap();

        let pos = Pos::new(1, 1);
        assert!(session.execute(Command::Reveal { pos }).await.unwrap().is_none());
        let view = session.execute(Command::Snapshot).await.unwrap().unwrap();
        assert!(view.won);
    }
}
