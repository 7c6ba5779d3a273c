//! Minesweeper engine.
//!
//! A [`Game`] holds one board and reports every change to a
//! [`MinesweeperListener`]. A [`Solver`] plays the moves that can be
//! deduced locally, and a [`Session`] ties both to a front-end that can
//! start new games.
//!
//! ```rust,no_run
//! use minesweeper_common::models::{Difficulty, Pos};
//! use minesweeper_engine::{EngineConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> minesweeper_engine::error::Result<()> {
//!     let (session, mut events) =
//!         Session::subscribe(Difficulty::Beginner.params(), EngineConfig::default())?;
//!
//!     session.reveal(Pos::new(0, 0)).await;
//!     if let Some(solve) = session.solve().await {
//!         let report = solve.await.expect("solver panicked");
//!         println!("{} chords, {} flags", report.chords, report.flags);
//!     }
//!
//!     while let Ok(event) = events.try_recv() {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;

pub mod config;
pub mod data;
pub mod error;
pub mod harness;
pub mod listener;
pub mod logic;
pub mod session;
pub mod solver;
pub mod timer;

pub use config::EngineConfig;
pub use data::{Board, Square};
pub use listener::{MinesweeperListener, NoopListener};
pub use logic::Game;
pub use session::Session;
pub use solver::{Deduction, SolveReport, Solver};
pub use timer::GameTimer;

/// A game shared between the player and the solver. Every command takes the
/// lock for its whole duration.
pub type SharedGame = Arc<Mutex<Game>>;
