//! Types shared between the minesweeper engine and the front-ends driving it.

pub mod models;
pub mod protocol;
