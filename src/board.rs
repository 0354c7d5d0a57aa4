use std::fmt;

use csta::prelude::*;
use rand::prelude::*;

use crate::{
    error::{GameError, Result},
    Move,
};

pub const DEFAULT_SIZE: usize = 4;
/// Probability that a spawned tile is a 2. The remainder spawns a 4.
pub const PROB_2: f64 = 0.9;

/// An N×N 2048 grid with its cumulative score.
///
/// Cells are stored row-major; `0` is an empty cell and every other value is
/// a power of two.
#[derive(Debug, Clone)]
pub struct Board {
    size: usize,
    grid: Vec<u32>,
    score: u64,
    prob2: f64,
    last_spawn: Option<(usize, usize)>,
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.grid == other.grid && self.score == other.score
    }
}

impl Eq for Board {}

impl Board {
    /// A fresh board with one to three random tiles.
    pub fn new(size: usize) -> Self {
        Self::new_with(size, &mut thread_rng())
    }

    pub fn new_with<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Self {
        assert!(size > 0, "board size must be positive");
        let mut board = Self::empty(size);
        board.reset_with(rng);
        board
    }

    /// A board with no tiles and a zero score.
    pub fn empty(size: usize) -> Self {
        Self {
            size,
            grid: vec![0; size * size],
            score: 0,
            prob2: PROB_2,
            last_spawn: None,
        }
    }

    /// Builds a board from an explicit snapshot, mostly for deterministic tests.
    pub fn from_grid(rows: Vec<Vec<u32>>) -> Result<Self> {
        let size = rows.len();
        if size == 0 {
            return Err(GameError::InvalidGrid("grid has no rows".into()));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != size) {
            return Err(GameError::InvalidGrid(format!(
                "row of length {} in a grid with {size} rows",
                row.len()
            )));
        }
        Self::from_cells(rows.into_iter().flatten().collect())
    }

    /// Builds a board from row-major cells. The cell count must be a perfect square.
    pub fn from_cells(cells: Vec<u32>) -> Result<Self> {
        let size = (cells.len() as f64).sqrt().round() as usize;
        if size == 0 || size * size != cells.len() {
            return Err(GameError::InvalidGrid(format!(
                "{} cells do not form a square grid",
                cells.len()
            )));
        }
        if let Some(bad) = cells.iter().find(|&&v| v != 0 && (v == 1 || !v.is_power_of_two())) {
            return Err(GameError::InvalidGrid(format!(
                "{bad} is not a power of two"
            )));
        }
        let mut board = Self::empty(size);
        board.grid = cells;
        Ok(board)
    }

    /// Overrides the probability of spawning a 2 (the rest spawn 4s).
    pub fn with_spawn_probability(mut self, prob2: f64) -> Self {
        assert!((0.0..=1.0).contains(&prob2), "probability out of range");
        self.prob2 = prob2;
        self
    }

    pub fn with_score(mut self, score: u64) -> Self {
        self.score = score;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn prob2(&self) -> f64 {
        self.prob2
    }

    pub fn prob4(&self) -> f64 {
        1.0 - self.prob2
    }

    pub fn cells(&self) -> &[u32] {
        &self.grid
    }

    /// Read-only snapshot of the grid as rows.
    pub fn grid(&self) -> Vec<Vec<u32>> {
        self.grid.chunks(self.size).map(|row| row.to_vec()).collect()
    }

    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.grid[self.index(row, col)]
    }

    /// Cell that received the most recent spawned tile, if any.
    pub fn last_spawn(&self) -> Option<(usize, usize)> {
        self.last_spawn
    }

    fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.size && col < self.size,
            "cell ({row}, {col}) outside a {0}x{0} board",
            self.size
        );
        row * self.size + col
    }

    /// Clears the board and places one to three random tiles.
    pub fn reset(&mut self) {
        self.reset_with(&mut thread_rng());
    }

    pub fn reset_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.grid.iter_mut().for_each(|cell| *cell = 0);
        self.score = 0;
        self.last_spawn = None;
        let count = rng.gen_range(1..=3).min(self.grid.len());
        self.spawn_unchecked(rng, count);
    }

    pub fn empty_squares(&self) -> Vec<(usize, usize)> {
        self.grid
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == 0)
            .map(|(i, _)| (i / self.size, i % self.size))
            .collect()
    }

    pub fn number_empty(&self) -> usize {
        self.grid.iter().filter(|&&v| v == 0).count()
    }

    /// Places `value` on an empty cell.
    pub fn place_tile(&mut self, row: usize, col: usize, value: u32) -> Result<()> {
        if row >= self.size || col >= self.size {
            return Err(GameError::OutOfBounds {
                row,
                col,
                size: self.size,
            });
        }
        if value == 1 || !value.is_power_of_two() {
            return Err(GameError::InvalidGrid(format!("{value} is not a power of two")));
        }
        let i = row * self.size + col;
        if self.grid[i] != 0 {
            return Err(GameError::OccupiedCell { row, col });
        }
        self.grid[i] = value;
        Ok(())
    }

    /// Cell indices of line `k` for `mv`, starting at the edge tiles slide towards.
    fn line(&self, mv: Move, k: usize) -> Vec<usize> {
        let n = self.size;
        match mv {
            Move::Left => (0..n).map(|c| k * n + c).collect(),
            Move::Right => (0..n).rev().map(|c| k * n + c).collect(),
            Move::Up => (0..n).map(|r| r * n + k).collect(),
            Move::Down => (0..n).rev().map(|r| r * n + k).collect(),
        }
    }

    /// Whether `mv` would change the grid: some tile has an empty or equal
    /// neighbour on the side it slides towards.
    pub fn is_valid(&self, mv: Move) -> bool {
        (0..self.size).any(|k| {
            let line = self.line(mv, k);
            line.windows(2).any(|pair| {
                let (to, from) = (self.grid[pair[0]], self.grid[pair[1]]);
                from != 0 && (to == 0 || to == from)
            })
        })
    }

    /// Valid moves in canonical order. Empty exactly when the game is over.
    pub fn valid_moves(&self) -> Vec<Move> {
        Move::ALL.into_iter().filter(|&mv| self.is_valid(mv)).collect()
    }

    pub fn is_game_over(&self) -> bool {
        !Move::ALL.iter().any(|&mv| self.is_valid(mv))
    }

    /// Slides every line in direction `mv` without spawning. Returns the points gained.
    ///
    /// A cell produced by a merge cannot merge again in the same shift, so
    /// `2 2 2 2` becomes `4 4` and `2 2 2` becomes `4 2`.
    pub fn shift(&mut self, mv: Move) -> u64 {
        let mut gained = 0;
        for k in 0..self.size {
            let line = self.line(mv, k);
            gained += slide_line(&mut self.grid, &line);
        }
        self.score += gained;
        gained
    }

    /// Places `count` tiles on distinct random empty cells.
    pub fn spawn(&mut self, count: usize) -> Result<()> {
        self.spawn_with(&mut thread_rng(), count)
    }

    pub fn spawn_with<R: Rng + ?Sized>(&mut self, rng: &mut R, count: usize) -> Result<()> {
        let available = self.number_empty();
        if count > available {
            return Err(GameError::NotEnoughEmpty {
                requested: count,
                available,
            });
        }
        self.spawn_unchecked(rng, count);
        Ok(())
    }

    fn spawn_unchecked<R: Rng + ?Sized>(&mut self, rng: &mut R, count: usize) {
        let empty = self.empty_squares();
        let count = count.min(empty.len());
        for k in rand::seq::index::sample(rng, empty.len(), count) {
            let (row, col) = empty[k];
            let value = if rng.gen_bool(self.prob2) { 2 } else { 4 };
            self.grid[row * self.size + col] = value;
            self.last_spawn = Some((row, col));
        }
    }

    /// Shifts and spawns one tile if `mv` is valid, otherwise does nothing.
    /// Returns whether the board changed.
    pub fn apply_move(&mut self, mv: Move) -> bool {
        self.apply_move_with(&mut thread_rng(), mv)
    }

    pub fn apply_move_with<R: Rng + ?Sized>(&mut self, rng: &mut R, mv: Move) -> bool {
        if !self.is_valid(mv) {
            return false;
        }
        self.shift(mv);
        // a valid shift always frees at least one cell
        self.spawn_unchecked(rng, 1);
        true
    }

    /// `apply_move` on a copy, leaving `self` untouched.
    pub fn successor(&self, mv: Move) -> Board {
        self.successor_with(&mut thread_rng(), mv)
    }

    pub fn successor_with<R: Rng + ?Sized>(&self, rng: &mut R, mv: Move) -> Board {
        let mut next = self.clone();
        next.apply_move_with(rng, mv);
        next
    }

    /// Every spawn outcome after shifting by `mv`, with its probability.
    ///
    /// Each empty cell yields a 2-branch (`p2 / empty`) followed by a
    /// 4-branch (`p4 / empty`), in row-major cell order. Both lists are empty
    /// when `mv` is not valid.
    pub fn all_successors(&self, mv: Move) -> (Vec<Board>, Vec<f64>) {
        if !self.is_valid(mv) {
            return (Vec::new(), Vec::new());
        }
        let mut shifted = self.clone();
        shifted.shift(mv);

        let empty = shifted.empty_squares();
        let n = empty.len() as f64;
        let mut states = Vec::with_capacity(2 * empty.len());
        let mut probs = Vec::with_capacity(2 * empty.len());
        for (row, col) in empty {
            for (value, prob) in [(2, shifted.prob2()), (4, shifted.prob4())] {
                let mut next = shifted.clone();
                next.grid[row * next.size + col] = value;
                next.last_spawn = Some((row, col));
                states.push(next);
                probs.push(prob / n);
            }
        }
        (states, probs)
    }

    pub fn max_tile(&self) -> u32 {
        self.grid.iter().copied().max().unwrap_or(0)
    }

    /// First cell in row-major order holding the max tile.
    pub fn max_tile_position(&self) -> (usize, usize) {
        let max = self.max_tile();
        let i = self.grid.iter().position(|&v| v == max).unwrap_or(0);
        (i / self.size, i % self.size)
    }

    /// The next cell along each axis (row below, column to the right), when
    /// inside the board. Summing over every cell visits each adjacent pair once.
    pub fn neighbors_of(&self, (row, col): (usize, usize)) -> Vec<(usize, usize)> {
        let mut neighbors = Vec::with_capacity(2);
        if row + 1 < self.size {
            neighbors.push((row + 1, col));
        }
        if col + 1 < self.size {
            neighbors.push((row, col + 1));
        }
        neighbors
    }

    pub fn manhattan_distance(a: (usize, usize), b: (usize, usize)) -> usize {
        a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
    }
}

/// Slides one line towards its first cell, merging equal pairs at most once
/// per destination. Returns the value of all merges.
fn slide_line(grid: &mut [u32], line: &[usize]) -> u64 {
    let mut merged = vec![false; line.len()];
    let mut gained = 0;
    for x in 1..line.len() {
        if grid[line[x]] == 0 {
            continue;
        }
        let mut pos = x;
        while pos > 0 {
            let (from, to) = (line[pos], line[pos - 1]);
            if grid[to] == 0 {
                grid[to] = grid[from];
                grid[from] = 0;
                pos -= 1;
            } else if grid[to] == grid[from] && !merged[pos - 1] {
                grid[to] *= 2;
                grid[from] = 0;
                merged[pos - 1] = true;
                gained += grid[to] as u64;
                break;
            } else {
                break;
            }
        }
    }
    gained
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.grid.chunks(self.size) {
            write!(f, "|")?;
            for cell in row {
                write!(f, "{cell}|")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::empty(DEFAULT_SIZE)
    }
}

impl Randomizable for Board {
    fn sample<D: Distribution<f64>, R: Rng + ?Sized>(_: &D, rng: &mut R) -> Self {
        Board::new_with(DEFAULT_SIZE, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_board;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;

    fn row_board(row: [u32; 4]) -> Board {
        let mut cells = vec![0; 16];
        cells[..4].copy_from_slice(&row);
        Board::from_cells(cells).unwrap()
    }

    #[test]
    fn four_equal_tiles_merge_pairwise() {
        let mut board = row_board([2, 2, 2, 2]);
        assert_eq!(board.shift(Move::Left), 8);
        assert_eq!(board.grid()[0], vec![4, 4, 0, 0]);
        assert_eq!(board.score(), 8);
    }

    #[test]
    fn merged_cell_does_not_merge_again() {
        let mut board = row_board([2, 2, 2, 0]);
        board.shift(Move::Left);
        assert_eq!(board.grid()[0], vec![4, 2, 0, 0]);
        assert_eq!(board.score(), 4);

        let mut board = row_board([2, 2, 4, 0]);
        board.shift(Move::Left);
        assert_eq!(board.grid()[0], vec![4, 4, 0, 0]);
        assert_eq!(board.score(), 4);
    }

    #[test]
    fn right_and_down_mirror_left_and_up() {
        let mut board = row_board([2, 2, 2, 0]);
        board.shift(Move::Right);
        assert_eq!(board.grid()[0], vec![0, 0, 2, 4]);

        let mut board = create_board!(
            2 0 0 0
            2 0 0 0
            4 0 0 0
            0 0 0 0
        );
        board.shift(Move::Down);
        assert_eq!(
            board.grid().iter().map(|r| r[0]).collect::<Vec<_>>(),
            vec![0, 0, 4, 4]
        );
        board.shift(Move::Up);
        assert_eq!(
            board.grid().iter().map(|r| r[0]).collect::<Vec<_>>(),
            vec![8, 0, 0, 0]
        );
        assert_eq!(board.score(), 12);
    }

    #[test]
    fn packed_unmergeable_row_is_unchanged() {
        let mut board = row_board([2, 4, 8, 16]);
        let before = board.clone();
        assert_eq!(board.shift(Move::Left), 0);
        assert_eq!(board, before);
        assert!(!board.is_valid(Move::Left));
        assert!(!board.is_valid(Move::Right));
    }

    #[test]
    fn second_left_shift_is_idempotent() {
        let mut board = create_board!(
            2 0 0 0
            0 0 0 0
            0 0 0 0
            0 0 0 2
        );
        board.shift(Move::Left);
        assert_eq!(board.score(), 0);
        let after_first = board.clone();
        board.shift(Move::Left);
        assert_eq!(board, after_first);
        assert_eq!(board.get(3, 0), 2);
        assert!(!board.is_valid(Move::Left));
    }

    #[test]
    fn validity_matches_grid_change() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut board = Board::new_with(4, &mut rng);
            for _ in 0..rng.gen_range(0..30) {
                let moves = board.valid_moves();
                let Some(&mv) = moves.choose(&mut rng) else {
                    break;
                };
                board.apply_move_with(&mut rng, mv);
            }
            for mv in Move::ALL {
                let mut clone = board.clone();
                clone.shift(mv);
                assert_eq!(board.is_valid(mv), clone.cells() != board.cells(), "{mv}\n{board}");
            }
            assert_eq!(board.is_game_over(), board.valid_moves().is_empty());
        }
    }

    #[test]
    fn full_board_without_pairs_is_game_over() {
        let board = create_board!(
            2 4 2 4
            4 2 4 2
            2 4 2 4
            4 2 4 2
        );
        assert!(board.is_game_over());
        assert!(board.valid_moves().is_empty());
        assert_eq!(board.all_successors(Move::Left), (vec![], vec![]));

        let board = create_board!(
            2 4 2 4
            4 2 4 2
            2 4 2 4
            4 2 8 8
        );
        assert_eq!(board.valid_moves(), vec![Move::Left, Move::Right]);
    }

    #[test]
    fn successor_probabilities_sum_to_one() {
        let board = create_board!(
            2 2 0 0
            0 4 0 0
            0 0 8 0
            0 0 0 2
        );
        for mv in board.valid_moves() {
            let mut shifted = board.clone();
            shifted.shift(mv);
            let k = shifted.number_empty();

            let (states, probs) = board.all_successors(mv);
            assert_eq!(states.len(), 2 * k);
            assert_eq!(probs.len(), 2 * k);
            assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
            for state in &states {
                assert_eq!(state.number_empty(), k - 1);
                assert_eq!(state.score(), shifted.score());
            }
        }
    }

    #[test]
    fn successor_leaves_original_untouched() {
        let board = row_board([2, 2, 0, 0]);
        let next = board.successor(Move::Left);
        assert_eq!(board.grid()[0], vec![2, 2, 0, 0]);
        assert_eq!(board.score(), 0);
        assert_eq!(next.score(), 4);
        assert_eq!(next.number_empty(), 14);
    }

    #[test]
    fn invalid_move_is_a_no_op() {
        let mut board = row_board([2, 4, 8, 16]);
        let before = board.clone();
        assert!(!board.apply_move(Move::Left));
        assert_eq!(board, before);
    }

    #[test]
    fn spawn_fills_distinct_empty_cells() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut board = Board::empty(4);
        board.spawn_with(&mut rng, 5).unwrap();
        assert_eq!(board.number_empty(), 11);
        assert!(board.cells().iter().all(|&v| v == 0 || v == 2 || v == 4));
        assert_matches!(
            board.spawn_with(&mut rng, 12),
            Err(GameError::NotEnoughEmpty { requested: 12, available: 11 })
        );
    }

    #[test]
    fn spawn_probability_controls_tile_values() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut board = Board::empty(4).with_spawn_probability(1.0);
        board.spawn_with(&mut rng, 16).unwrap();
        assert!(board.cells().iter().all(|&v| v == 2));

        let mut board = Board::empty(4).with_spawn_probability(0.0);
        board.spawn_with(&mut rng, 16).unwrap();
        assert!(board.cells().iter().all(|&v| v == 4));
    }

    #[test]
    fn new_board_has_one_to_three_tiles() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let board = Board::new_with(4, &mut rng);
            let tiles = 16 - board.number_empty();
            assert!((1..=3).contains(&tiles));
            assert_eq!(board.score(), 0);
        }
    }

    #[test]
    fn place_tile_rejects_misuse() {
        let mut board = row_board([2, 0, 0, 0]);
        assert_matches!(board.place_tile(0, 0, 2), Err(GameError::OccupiedCell { row: 0, col: 0 }));
        assert_matches!(board.place_tile(4, 0, 2), Err(GameError::OutOfBounds { .. }));
        assert_matches!(board.place_tile(1, 1, 3), Err(GameError::InvalidGrid(_)));
        board.place_tile(1, 1, 8).unwrap();
        assert_eq!(board.get(1, 1), 8);
    }

    #[test]
    fn from_grid_validates_shape_and_values() {
        assert_matches!(Board::from_grid(vec![vec![2, 0], vec![0]]), Err(GameError::InvalidGrid(_)));
        assert_matches!(Board::from_grid(vec![vec![2, 3], vec![0, 0]]), Err(GameError::InvalidGrid(_)));
        assert_matches!(Board::from_cells(vec![2, 0, 0]), Err(GameError::InvalidGrid(_)));
        let board = Board::from_grid(vec![vec![2, 0], vec![0, 4]]).unwrap();
        assert_eq!(board.grid(), vec![vec![2, 0], vec![0, 4]]);
    }

    #[test]
    fn feature_readouts() {
        let board = create_board!(
            2 0 0 0
            0 64 0 0
            0 0 8 0
            0 0 0 64
        );
        assert_eq!(board.max_tile(), 64);
        assert_eq!(board.max_tile_position(), (1, 1));
        assert_eq!(board.number_empty(), 12);
        assert_eq!(board.neighbors_of((0, 0)), vec![(1, 0), (0, 1)]);
        assert_eq!(board.neighbors_of((3, 2)), vec![(3, 3)]);
        assert!(board.neighbors_of((3, 3)).is_empty());
        assert_eq!(Board::manhattan_distance((1, 1), (3, 3)), 4);
    }

    #[test]
    fn reset_starts_a_new_trial() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut board = row_board([2, 2, 0, 0]);
        board.shift(Move::Left);
        board.reset_with(&mut rng);
        assert_eq!(board.score(), 0);
        assert!(board.number_empty() >= 13);
    }

    #[test]
    fn display_renders_rows() {
        let board = create_board!(2 0 0 4);
        assert_eq!(board.to_string(), "|2|0|\n|0|4|\n");
    }
}
