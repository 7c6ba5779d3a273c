use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use minesweeper_common::models::Pos;
use tokio::{task::JoinHandle, time};
use tracing::{debug, info, instrument, trace};

use crate::{SharedGame, data::Board};

/// What one of the two local rules concludes about a revealed square.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deduction {
    /// Every mine around the square is flagged, the rest is safe.
    Chord,
    /// The unopened neighbours are exactly the missing mines.
    Flag(Vec<Pos>),
}

/// Applies the chord rule, then the flag rule, to the square at `pos`.
pub fn deduce(board: &Board, pos: Pos) -> Option<Deduction> {
    let square = board.square(pos)?;
    if square.is_mine() || !square.is_revealed() {
        return None;
    }

    if board.has_clickable_surround(pos) && board.is_satisfied(pos) {
        return Some(Deduction::Chord);
    }

    let count = square.adjacent_mines() as usize;
    let empty = board.clickable_surround(pos);
    if count != 0 && !empty.is_empty() && board.flagged_neighbours(pos) + empty.len() == count {
        return Some(Deduction::Flag(empty));
    }

    None
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveReport {
    pub passes: usize,
    pub chords: usize,
    pub flags: usize,
}

struct SolvingGuard(Arc<AtomicBool>);

impl Drop for SolvingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Plays every move the local rules allow, in the background, until a full
/// pass over the board changes nothing.
///
/// Moves go through the game's mutex one square at a time, so a player can
/// keep clicking while the solver runs.
pub struct Solver {
    game: SharedGame,
    delay: Duration,
    solving: Arc<AtomicBool>,
    // cancel token of the latest solve, each run gets a fresh one
    cancelled: Mutex<Arc<AtomicBool>>,
}

impl Solver {
    pub fn new(game: SharedGame, delay: Duration) -> Self {
        Self {
            game,
            delay,
            solving: Arc::new(AtomicBool::new(false)),
            cancelled: Mutex::new(Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn is_solving(&self) -> bool {
        self.solving.load(Ordering::SeqCst)
    }

    /// Stops the running solve before its next square. Also takes effect on a
    /// solve still waiting for the game.
    pub fn cancel(&self) {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .store(true, Ordering::SeqCst);
    }

    /// Spawns a solve. Returns `None`, doing nothing, while another solve is
    /// running, before the first reveal, or once the game is over.
    #[instrument(level = "trace", skip(self))]
    pub async fn solve(&self) -> Option<JoinHandle<SolveReport>> {
        if self
            .solving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Solve already running, dropping request");
            return None;
        }
        let guard = SolvingGuard(self.solving.clone());
        let cancelled = Arc::new(AtomicBool::new(false));
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner) = cancelled.clone();

        {
            let game = self.game.lock().await;
            if !game.board().is_populated() || game.is_finished() {
                debug!("Nothing to solve");
                return None;
            }
        }

        let game = self.game.clone();
        let delay = self.delay;

        Some(tokio::spawn(async move {
            let _guard = guard;
            let report = run(game, delay, cancelled).await;
            info!(
                "Solver finished after {} passes: {} chords, {} flags",
                report.passes, report.chords, report.flags
            );
            report
        }))
    }
}

async fn run(shared: SharedGame, delay: Duration, cancelled: Arc<AtomicBool>) -> SolveReport {
    let mut report = SolveReport::default();

    let positions: Vec<Pos> = {
        let game = shared.lock().await;
        game.squares().iter().map(|square| square.pos()).collect()
    };

    loop {
        report.passes += 1;
        let mut changed = false;

        for &pos in &positions {
            let mut game = shared.lock().await;
            if cancelled.load(Ordering::SeqCst) {
                debug!("Solve cancelled");
                return report;
            }
            if game.is_finished() {
                return report;
            }

            let deduction = deduce(game.board(), pos);
            match deduction {
                Some(Deduction::Chord) => {
                    trace!("Chording satisfied square {}", pos);
                    game.chord(pos);
                    drop(game);
                    report.chords += 1;
                    changed = true;
                    time::sleep(delay).await;
                }
                Some(Deduction::Flag(targets)) => {
                    trace!("Flagging {} forced mines around {}", targets.len(), pos);
                    for &target in &targets {
                        game.set_flagged(target);
                    }
                    game.listener().move_finished();
                    report.flags += targets.len();
                    changed = true;
                }
                None => {}
            }
        }

        if !changed {
            return report;
        }
    }
}
