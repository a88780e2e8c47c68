use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side length of the classic board.
pub const DEFAULT_SIZE: usize = 4;
/// Tile value that wins the game.
pub const DEFAULT_WIN_VALUE: u32 = 2048;
/// Probability that a spawned tile is a 4 instead of a 2.
pub const DEFAULT_FOUR_PROBABILITY: f64 = 0.1;
/// Largest tile value a board may hold. Tiles at this value no longer merge.
pub const MAX_TILE_VALUE: u32 = 1 << 30;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    /// Unit vector `(dx, dy)`; `y` grows downwards.
    #[inline]
    pub fn vector(self) -> (isize, isize) {
        match self {
            Move::Up => (0, -1),
            Move::Down => (0, 1),
            Move::Left => (-1, 0),
            Move::Right => (1, 0),
        }
    }

    pub fn rotate_cw(self) -> Move {
        match self {
            Move::Up => Move::Right,
            Move::Right => Move::Down,
            Move::Down => Move::Left,
            Move::Left => Move::Up,
        }
    }

    pub fn rotate_ccw(self) -> Move {
        match self {
            Move::Up => Move::Left,
            Move::Left => Move::Down,
            Move::Down => Move::Right,
            Move::Right => Move::Up,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown direction {0:?} (expected up, down, left or right)")]
pub struct ParseMoveError(pub String);

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Move::Up),
            "down" => Ok(Move::Down),
            "left" => Ok(Move::Left),
            "right" => Ok(Move::Right),
            _ => Err(ParseMoveError(s.to_string())),
        }
    }
}

/// Cell coordinate: `x` is the column (0 = left), `y` the row (0 = top).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    #[inline]
    pub const fn new(x: usize, y: usize) -> Self { Position { x, y } }

    /// The neighbouring cell one step towards `dir`, if it is on a `size`×`size` board.
    #[inline]
    pub fn step(self, dir: Move, size: usize) -> Option<Position> {
        let (dx, dy) = dir.vector();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        (x < size && y < size).then_some(Position { x, y })
    }
}

/// A single tile. `merged` marks a tile created by a merge during the current
/// move; `is_new` marks the most recently spawned tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub x: usize,
    pub y: usize,
    pub value: u32,
    pub merged: bool,
    #[serde(rename = "new")]
    pub is_new: bool,
}

impl Tile {
    pub fn new(position: Position, value: u32) -> Self {
        Tile { x: position.x, y: position.y, value, merged: false, is_new: false }
    }

    #[inline]
    pub fn position(&self) -> Position { Position::new(self.x, self.y) }
}

/// One merge produced by a move: where the merged tile ended up and its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeEvent {
    pub position: Position,
    pub value: u32,
}

/// Outcome of [`Grid::move_tiles`].
///
/// `score` already includes the grid's active score multiplier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveResult {
    pub moved: bool,
    pub merged: Vec<MergeEvent>,
    pub score: u64,
}

impl MoveResult {
    /// Fold another move of the same turn into this result.
    pub fn absorb(&mut self, other: MoveResult) {
        self.moved |= other.moved;
        self.merged.extend(other.merged);
        self.score = self.score.saturating_add(other.score);
    }
}

/// Read-only board summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridStats {
    pub tile_count: usize,
    pub empty_count: usize,
    pub max_tile: u32,
    pub total_value: u64,
    pub fill_rate: f64,
}

/// True for 2, 4, 8, ... up to [`MAX_TILE_VALUE`].
#[inline]
pub fn is_tile_value(value: u32) -> bool { value >= 2 && value <= MAX_TILE_VALUE && value.is_power_of_two() }

/// True when two tiles of `value` may merge without leaving the tile range.
#[inline]
pub fn can_merge(value: u32) -> bool { value <= MAX_TILE_VALUE / 2 }

/// Square board of optional tiles plus the running score.
///
/// Cells are stored row-major; every occupied cell holds exactly one tile
/// whose `(x, y)` matches the cell.
#[derive(Clone, PartialEq)]
pub struct Grid {
    size: usize,
    cells: Vec<Option<Tile>>,
    score: u64,
    score_multiplier: f64,
    win_value: u32,
    four_probability: f64,
}

impl Default for Grid {
    fn default() -> Self { Grid::new(DEFAULT_SIZE) }
}

impl Grid {
    /// Empty `size`×`size` board (at least 2×2).
    pub fn new(size: usize) -> Self {
        let size = size.max(2);
        Grid {
            size,
            cells: vec![None; size * size],
            score: 0,
            score_multiplier: 1.0,
            win_value: DEFAULT_WIN_VALUE,
            four_probability: DEFAULT_FOUR_PROBABILITY,
        }
    }

    pub fn with_win_value(mut self, win_value: u32) -> Self {
        self.win_value = win_value;
        self
    }

    pub fn with_four_probability(mut self, p: f64) -> Self {
        self.four_probability = if p.is_finite() { p.clamp(0.0, 1.0) } else { DEFAULT_FOUR_PROBABILITY };
        self
    }

    /// Build a board from row-major values (`rows[y][x]`, 0 = empty).
    ///
    /// Returns `None` unless the rows form a square of at least 2×2 and
    /// every non-zero value is a power of two ≥ 2.
    ///
    /// ```
    /// use nezha_2048::engine::{Grid, Move};
    /// let mut g = Grid::from_rows(&[
    ///     vec![2, 2, 4, 4],
    ///     vec![0, 0, 0, 0],
    ///     vec![0, 0, 0, 0],
    ///     vec![0, 0, 0, 0],
    /// ]).unwrap();
    /// let r = g.move_tiles(Move::Left);
    /// assert_eq!(r.score, 12);
    /// assert_eq!(g.to_rows()[0], vec![4, 8, 0, 0]);
    /// ```
    pub fn from_rows(rows: &[Vec<u32>]) -> Option<Self> {
        let size = rows.len();
        if size < 2 || rows.iter().any(|r| r.len() != size) {
            return None;
        }
        let mut grid = Grid::new(size);
        for (y, row) in rows.iter().enumerate() {
            for (x, &value) in row.iter().enumerate() {
                if value == 0 { continue; }
                if !is_tile_value(value) { return None; }
                grid.place_tile(Position::new(x, y), value);
            }
        }
        Some(grid)
    }

    /// Row-major snapshot of tile values (0 = empty).
    pub fn to_rows(&self) -> Vec<Vec<u32>> {
        (0..self.size)
            .map(|y| (0..self.size).map(|x| self.value_at(Position::new(x, y))).collect())
            .collect()
    }

    #[inline]
    pub fn size(&self) -> usize { self.size }

    #[inline]
    pub fn score(&self) -> u64 { self.score }

    #[inline]
    pub fn win_value(&self) -> u32 { self.win_value }

    #[inline]
    pub fn score_multiplier(&self) -> f64 { self.score_multiplier }

    #[inline]
    fn index(&self, pos: Position) -> usize { pos.y * self.size + pos.x }

    #[inline]
    pub fn in_bounds(&self, pos: Position) -> bool { pos.x < self.size && pos.y < self.size }

    pub fn tile(&self, pos: Position) -> Option<&Tile> {
        if !self.in_bounds(pos) { return None; }
        self.cells[self.index(pos)].as_ref()
    }

    /// Tile value at `pos`, 0 when empty or out of bounds.
    #[inline]
    pub fn value_at(&self, pos: Position) -> u32 { self.tile(pos).map_or(0, |t| t.value) }

    /// All tiles in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> + '_ { self.cells.iter().flatten() }

    /// True iff sliding one step towards `dir` would change at least one
    /// occupied cell (enter an empty neighbour or meet an equal one).
    ///
    /// This is a local adjacency check, not a slide simulation.
    pub fn can_move(&self, dir: Move) -> bool {
        self.tiles().any(|tile| {
            match tile.position().step(dir, self.size) {
                None => false,
                Some(next) => match self.tile(next) {
                    None => true,
                    Some(other) => other.value == tile.value && can_merge(tile.value),
                },
            }
        })
    }

    /// Slide and merge every tile towards `dir`.
    ///
    /// A no-op returning `moved = false` when [`Grid::can_move`] is false.
    /// A tile produced by a merge cannot merge again in the same call.
    pub fn move_tiles(&mut self, dir: Move) -> MoveResult {
        if !self.can_move(dir) {
            return MoveResult::default();
        }
        for tile in self.cells.iter_mut().flatten() {
            tile.merged = false;
            tile.is_new = false;
        }

        let (xs, ys) = self.traversal(dir);
        let mut result = MoveResult::default();
        let mut raw_score = 0u64;
        for &x in &xs {
            for &y in &ys {
                let from = Position::new(x, y);
                let Some(tile) = self.tile(from).copied() else { continue };
                let (farthest, next) = self.find_farthest(from, dir);

                let merge_target = next.filter(|&n| {
                    self.tile(n).is_some_and(|t| t.value == tile.value && !t.merged && can_merge(t.value))
                });
                if let Some(target) = merge_target {
                    let value = tile.value * 2;
                    let idx_from = self.index(from);
                    let idx_to = self.index(target);
                    self.cells[idx_from] = None;
                    self.cells[idx_to] = Some(Tile { merged: true, ..Tile::new(target, value) });
                    raw_score += value as u64;
                    result.merged.push(MergeEvent { position: target, value });
                    result.moved = true;
                } else if farthest != from {
                    let idx_from = self.index(from);
                    let idx_to = self.index(farthest);
                    self.cells[idx_from] = None;
                    self.cells[idx_to] = Some(Tile { x: farthest.x, y: farthest.y, ..tile });
                    result.moved = true;
                }
            }
        }

        result.score = self.apply_multiplier(raw_score);
        self.score = self.score.saturating_add(result.score);
        result
    }

    fn apply_multiplier(&self, raw: u64) -> u64 {
        if self.score_multiplier == 1.0 { raw } else { (raw as f64 * self.score_multiplier).round() as u64 }
    }

    /// Cell visitation order: cells nearest the target edge come first.
    fn traversal(&self, dir: Move) -> (Vec<usize>, Vec<usize>) {
        let (dx, dy) = dir.vector();
        let mut xs: Vec<usize> = (0..self.size).collect();
        let mut ys: Vec<usize> = (0..self.size).collect();
        if dx == 1 { xs.reverse(); }
        if dy == 1 { ys.reverse(); }
        (xs, ys)
    }

    /// Last empty cell reachable from `from` towards `dir`, and the occupied
    /// cell that stopped the slide (if any).
    fn find_farthest(&self, from: Position, dir: Move) -> (Position, Option<Position>) {
        let mut farthest = from;
        loop {
            match farthest.step(dir, self.size) {
                Some(next) if self.tile(next).is_none() => farthest = next,
                Some(next) => return (farthest, Some(next)),
                None => return (farthest, None),
            }
        }
    }

    /// Spawn a tile in a uniformly random empty cell.
    ///
    /// Without an explicit `value` the tile is a 2 (90%) or a 4 (10%).
    /// Returns `None` and leaves the board untouched when it is full.
    ///
    /// ```
    /// use nezha_2048::engine::Grid;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let mut g = Grid::default();
    /// let t = g.add_random_tile(&mut rng, None).unwrap();
    /// assert!(t.value == 2 || t.value == 4);
    /// assert_eq!(g.empty_cells().len(), 15);
    /// ```
    pub fn add_random_tile<R: Rng + ?Sized>(&mut self, rng: &mut R, value: Option<u32>) -> Option<Tile> {
        let empty = self.empty_cells();
        if empty.is_empty() {
            return None;
        }
        let pos = empty[rng.gen_range(0..empty.len())];
        let value = value.unwrap_or_else(|| if rng.gen_bool(self.four_probability) { 4 } else { 2 });
        let tile = Tile { is_new: true, ..Tile::new(pos, value) };
        let idx = self.index(pos);
        self.cells[idx] = Some(tile);
        Some(tile)
    }

    /// True iff the board is full and no direction can move.
    pub fn is_game_over(&self) -> bool {
        self.empty_cells().is_empty() && Move::ALL.iter().all(|&d| !self.can_move(d))
    }

    pub fn is_won(&self) -> bool { self.tiles().any(|t| t.value >= self.win_value) }

    pub fn max_tile_value(&self) -> u32 { self.tiles().map(|t| t.value).max().unwrap_or(0) }

    pub fn empty_cells(&self) -> Vec<Position> {
        (0..self.size * self.size)
            .filter(|&i| self.cells[i].is_none())
            .map(|i| Position::new(i % self.size, i / self.size))
            .collect()
    }

    /// Occupied share of the board in `[0, 1]`.
    pub fn fill_rate(&self) -> f64 {
        self.tiles().count() as f64 / (self.size * self.size) as f64
    }

    pub fn stats(&self) -> GridStats {
        let tile_count = self.tiles().count();
        GridStats {
            tile_count,
            empty_count: self.size * self.size - tile_count,
            max_tile: self.max_tile_value(),
            total_value: self.tiles().map(|t| t.value as u64).sum(),
            fill_rate: self.fill_rate(),
        }
    }

    /// Remove the tile at `pos`. Only bounds are checked.
    pub fn clear_cell(&mut self, pos: Position) -> Option<Tile> {
        if !self.in_bounds(pos) { return None; }
        let idx = self.index(pos);
        self.cells[idx].take()
    }

    /// Put a tile with `value` at `pos`, replacing whatever was there.
    /// Returns false when `pos` is off the board.
    pub fn place_tile(&mut self, pos: Position, value: u32) -> bool {
        if !self.in_bounds(pos) { return false; }
        let idx = self.index(pos);
        self.cells[idx] = Some(Tile::new(pos, value));
        true
    }

    /// Add points directly, bypassing the multiplier.
    pub fn add_score(&mut self, points: u64) { self.score = self.score.saturating_add(points); }

    pub fn set_score(&mut self, score: u64) { self.score = score; }

    /// Multiplier applied to merge scoring from the next move on.
    pub fn set_score_multiplier(&mut self, multiplier: f64) {
        self.score_multiplier = if multiplier.is_finite() && multiplier > 0.0 { multiplier } else { 1.0 };
    }

    /// Empty every cell and zero the score; keeps size and options.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = None);
        self.score = 0;
        self.score_multiplier = 1.0;
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grid({:?}, score={})", self.to_rows(), self.score)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = "-".repeat(self.size * 8);
        writeln!(f)?;
        for (y, row) in self.to_rows().iter().enumerate() {
            let cells: Vec<String> = row.iter().map(|&v| format_val(v)).collect();
            writeln!(f, "{}", cells.join("|"))?;
            if y + 1 < self.size {
                writeln!(f, "{}", sep)?;
            }
        }
        Ok(())
    }
}

fn format_val(val: u32) -> String {
    match val {
        0 => String::from("       "),
        v => format!("{:^7}", v),
    }
}
