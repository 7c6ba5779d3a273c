use minesweeper_common::models::{Cell, GameParams, MarkState, Pos};
use rand::{Rng, seq::SliceRandom};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Square {
    pos: Pos,
    mine: bool,
    adjacent: u8,
    revealed: bool,
    mark: MarkState,
}

impl Square {
    fn new(pos: Pos) -> Self {
        Self {
            pos,
            mine: false,
            adjacent: 0,
            revealed: false,
            mark: MarkState::Unmarked,
        }
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }

    pub fn is_mine(&self) -> bool {
        self.mine
    }

    /// Number of mines around this square. Meaningless on a mine.
    pub fn adjacent_mines(&self) -> u8 {
        self.adjacent
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn mark(&self) -> MarkState {
        self.mark
    }

    pub fn is_flagged(&self) -> bool {
        self.mark == MarkState::Flagged
    }

    pub fn is_questioned(&self) -> bool {
        self.mark == MarkState::Questioned
    }

    fn set_mine(&mut self) {
        self.mine = true;
        self.adjacent = 0;
    }

    fn set_non_mine(&mut self, adjacent: u8) {
        self.mine = false;
        self.adjacent = adjacent;
    }

    pub(crate) fn reveal(&mut self) {
        self.revealed = true;
        self.mark = MarkState::Unmarked;
    }

    /// Advances the mark cycle and returns the new mark, or `None` when the
    /// square is already revealed.
    pub(crate) fn toggle_mark(&mut self, question_mode: bool) -> Option<MarkState> {
        if self.revealed {
            return None;
        }

        self.mark = match self.mark {
            MarkState::Unmarked => MarkState::Flagged,
            MarkState::Flagged if question_mode => MarkState::Questioned,
            MarkState::Flagged | MarkState::Questioned => MarkState::Unmarked,
        };
        Some(self.mark)
    }

    /// Returns whether the square changed.
    pub(crate) fn set_flagged(&mut self) -> bool {
        if self.revealed || self.is_flagged() {
            return false;
        }
        self.mark = MarkState::Flagged;
        true
    }
}

impl From<&Square> for Cell {
    fn from(value: &Square) -> Self {
        match value.mark {
            _ if value.revealed && value.mine => Self::Bomb,
            _ if value.revealed => Self::Revealed {
                adjacent: value.adjacent,
            },
            MarkState::Unmarked => Self::Hidden,
            MarkState::Flagged => Self::Flagged,
            MarkState::Questioned => Self::Marked,
        }
    }
}

pub(crate) fn validate_params(params: &GameParams) -> Result<()> {
    let reason = if params.width == 0 || params.height == 0 {
        Some("board dimensions must be greater than 0")
    } else if params
        .width
        .checked_mul(params.height)
        .is_none_or(|cells| params.mines > cells)
    {
        Some("mine count must not exceed the number of squares")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidConfiguration {
            width: params.width,
            height: params.height,
            mines: params.mines,
            reason,
        }),
        None => Ok(()),
    }
}

/// The grid of squares for one game. Mines are laid lazily, on the first
/// reveal, so that the first square opened is never a mine.
#[derive(Debug, Clone)]
pub struct Board {
    width: usize,
    height: usize,
    mines: usize,
    squares: Vec<Square>,
    populated: bool,
}

impl Board {
    pub fn new(params: GameParams) -> Result<Self> {
        validate_params(&params)?;

        let squares = (0..params.height)
            .flat_map(|y| (0..params.width).map(move |x| Square::new(Pos::new(x, y))))
            .collect();

        Ok(Self {
            width: params.width,
            height: params.height,
            mines: params.mines,
            squares,
            populated: false,
        })
    }

    /// Builds an already populated board with mines exactly at `mines`.
    /// Duplicate positions count once.
    pub fn with_mines(width: usize, height: usize, mines: &[Pos]) -> Result<Self> {
        let mut layout = vec![false; width.saturating_mul(height)];
        for pos in mines {
            if pos.x >= width || pos.y >= height {
                return Err(Error::InvalidConfiguration {
                    width,
                    height,
                    mines: mines.len(),
                    reason: "mine position outside the board",
                });
            }
            layout[pos.x + pos.y * width] = true;
        }

        let count = layout.iter().filter(|mine| **mine).count();
        let mut board = Self::new(GameParams::new(width, height, count))?;
        board.lay_mines(&layout);
        Ok(board)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn mines(&self) -> usize {
        self.mines
    }

    pub fn params(&self) -> GameParams {
        GameParams::new(self.width, self.height, self.mines)
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn position_exists(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    pub fn square(&self, pos: Pos) -> Option<&Square> {
        if !self.contains(pos) {
            return None;
        }
        self.squares.get(pos.x + pos.y * self.width)
    }

    pub(crate) fn square_mut(&mut self, pos: Pos) -> Option<&mut Square> {
        if !self.contains(pos) {
            return None;
        }
        self.squares.get_mut(pos.x + pos.y * self.width)
    }

    /// All squares in row-major order.
    pub fn squares(&self) -> &[Square] {
        &self.squares
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Square]> {
        self.squares.chunks(self.width)
    }

    /// Positions of the up to eight squares around `pos` that lie on the board.
    pub fn neighbours(&self, pos: Pos) -> impl Iterator<Item = Pos> + '_ {
        let (x, y) = (pos.x as isize, pos.y as isize);
        (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .map(move |(dx, dy)| (x + dx, y + dy))
            .filter(move |&(nx, ny)| self.position_exists(nx, ny))
            .map(|(nx, ny)| Pos::new(nx as usize, ny as usize))
    }

    pub fn populate(&mut self, safe: Pos) {
        self.populate_with_rng(safe, &mut rand::rng());
    }

    /// Lays the mines anywhere except `safe`. Only the first call on a board
    /// has any effect.
    pub fn populate_with_rng<R: Rng + ?Sized>(&mut self, safe: Pos, rng: &mut R) {
        if self.populated {
            trace!("Board already populated, ignoring populate at {}", safe);
            return;
        }
        if !self.contains(safe) {
            warn!("Refusing to populate around off-board square {}", safe);
            return;
        }

        let cells = self.width * self.height;
        let safe_index = safe.x + safe.y * self.width;

        let mut candidates: Vec<usize> = (0..cells).filter(|&i| i != safe_index).collect();
        candidates.shuffle(rng);

        let mut layout = vec![false; cells];
        for &index in candidates.iter().take(self.mines) {
            layout[index] = true;
        }
        if self.mines > candidates.len() {
            // every square is a mine, the first click cannot be spared
            layout[safe_index] = true;
        }

        self.lay_mines(&layout);
        debug!(
            "Populated {}x{} board with {} mines, safe square {}",
            self.width, self.height, self.mines, safe
        );
    }

    fn lay_mines(&mut self, layout: &[bool]) {
        for index in 0..self.squares.len() {
            if layout[index] {
                self.squares[index].set_mine();
                continue;
            }

            let pos = self.squares[index].pos();
            let adjacent = self
                .neighbours(pos)
                .filter(|n| layout[n.x + n.y * self.width])
                .count() as u8;
            self.squares[index].set_non_mine(adjacent);
        }
        self.populated = true;
    }

    fn count_neighbours(&self, pos: Pos, predicate: impl Fn(&Square) -> bool) -> usize {
        self.neighbours(pos)
            .filter_map(|n| self.square(n))
            .filter(|square| predicate(*square))
            .count()
    }

    pub fn flagged_neighbours(&self, pos: Pos) -> usize {
        self.count_neighbours(pos, Square::is_flagged)
    }

    /// A non-mine with at least one adjacent mine and exactly as many flags
    /// around it as adjacent mines.
    pub fn is_satisfied(&self, pos: Pos) -> bool {
        match self.square(pos) {
            Some(square) if !square.is_mine() && square.adjacent_mines() > 0 => {
                self.flagged_neighbours(pos) == square.adjacent_mines() as usize
            }
            _ => false,
        }
    }

    /// Whether chording at `pos` would open anything.
    pub fn has_clickable_surround(&self, pos: Pos) -> bool {
        match self.square(pos) {
            Some(square) if !square.is_mine() => self
                .neighbours(pos)
                .filter_map(|n| self.square(n))
                .any(|n| !n.is_revealed() && !n.is_flagged()),
            _ => false,
        }
    }

    /// Neighbours that are neither revealed nor flagged.
    pub fn clickable_surround(&self, pos: Pos) -> Vec<Pos> {
        if !self.contains(pos) {
            return Vec::new();
        }
        self.neighbours(pos)
            .filter(|&n| {
                self.square(n)
                    .is_some_and(|square| !square.is_revealed() && !square.is_flagged())
            })
            .collect()
    }

    /// Adjacent mines minus adjacent flags. Negative when over-flagged.
    pub fn mines_needed(&self, pos: Pos) -> i32 {
        match self.square(pos) {
            Some(square) => square.adjacent_mines() as i32 - self.flagged_neighbours(pos) as i32,
            None => 0,
        }
    }

    pub fn is_surround_revealed(&self, pos: Pos) -> bool {
        match self.square(pos) {
            Some(square) if !square.is_mine() => self
                .neighbours(pos)
                .filter_map(|n| self.square(n))
                .all(Square::is_revealed),
            _ => false,
        }
    }
}
