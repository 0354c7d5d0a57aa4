//! Weighted-feature evaluation of boards.
//!
//! Every feature is a pure function of a [`Board`]. A [`Weights`] mapping
//! selects features and scales them; [`evaluate`] sums the positively
//! weighted ones.

use std::{collections::BTreeMap, fmt, path::Path, str::FromStr};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    board::Board,
    error::{GameError, Result},
};

/// Named board features known to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    Score,
    MaxTile,
    NumEmpty,
    MaxTileCorner,
    TileDiff,
    Monotonicity,
    SnakeMonotonicity,
    LogScore,
    FullMaxRow,
}

impl Feature {
    pub const ALL: [Feature; 9] = [
        Feature::Score,
        Feature::MaxTile,
        Feature::NumEmpty,
        Feature::MaxTileCorner,
        Feature::TileDiff,
        Feature::Monotonicity,
        Feature::SnakeMonotonicity,
        Feature::LogScore,
        Feature::FullMaxRow,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Score => "score",
            Feature::MaxTile => "maxTile",
            Feature::NumEmpty => "numEmpty",
            Feature::MaxTileCorner => "maxTileCorner",
            Feature::TileDiff => "tileDiff",
            Feature::Monotonicity => "monotonicity",
            Feature::SnakeMonotonicity => "snakeMonotonicity",
            Feature::LogScore => "logScore",
            Feature::FullMaxRow => "fullMaxRow",
        }
    }

    pub fn compute(&self, board: &Board) -> f64 {
        match self {
            Feature::Score => board.score() as f64,
            Feature::MaxTile => board.max_tile() as f64,
            Feature::NumEmpty => board.number_empty() as f64,
            Feature::MaxTileCorner => max_tile_corner(board),
            Feature::TileDiff => tile_diff(board),
            Feature::Monotonicity => monotonicity(board),
            Feature::SnakeMonotonicity => snake_monotonicity(board),
            Feature::LogScore => log_score(board),
            Feature::FullMaxRow => full_max_row(board),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = GameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| GameError::UnknownFeature(s.to_string()))
    }
}

/// The corner the max tile is steered towards.
fn target_corner(board: &Board) -> (usize, usize) {
    (board.size() - 1, board.size() - 1)
}

/// log2 of a tile value, with empty cells as 0.
fn rank(value: u32) -> i64 {
    if value == 0 {
        0
    } else {
        value.trailing_zeros() as i64
    }
}

fn max_tile_corner(board: &Board) -> f64 {
    let dist = Board::manhattan_distance(target_corner(board), board.max_tile_position());
    -(dist as f64)
}

/// Negative sum of rank differences over every adjacent pair. Empty cells
/// take part as rank 0.
fn tile_diff(board: &Board) -> f64 {
    let n = board.size();
    let mut diff = 0;
    for i in 0..n {
        for j in 0..n {
            let here = rank(board.get(i, j));
            for (x, y) in board.neighbors_of((i, j)) {
                diff += (rank(board.get(x, y)) - here).abs();
            }
        }
    }
    -(diff as f64)
}

/// Severity of the decreases along a line of `log2(v + 1)` values.
fn line_penalty(values: impl IntoIterator<Item = u32>) -> f64 {
    let mut penalty = 0.0;
    let mut prev = 0.0;
    for v in values {
        let val = (v as f64 + 1.0).log2();
        if val < prev {
            penalty += (prev - val) * prev;
        }
        prev = val;
    }
    penalty
}

/// Penalises rows read left to right and columns read top to bottom whenever
/// they decrease. Lines closer to the bottom-right corner weigh more.
fn monotonicity(board: &Board) -> f64 {
    let n = board.size();
    let mut total = 0.0;
    for k in 0..n {
        let weight = (k + 1) as f64;
        total += line_penalty((0..n).map(|c| board.get(k, c))) * weight;
        total += line_penalty((0..n).map(|r| board.get(r, k))) * weight;
    }
    -total
}

/// Penalises decreases along the serpentine path: row 0 left to right, row 1
/// right to left, and so on.
fn snake_monotonicity(board: &Board) -> f64 {
    let n = board.size();
    let path = (0..n).flat_map(|row| {
        let cols: Box<dyn Iterator<Item = usize>> = if row % 2 == 0 {
            Box::new(0..n)
        } else {
            Box::new((0..n).rev())
        };
        cols.map(move |col| board.get(row, col))
    });
    -line_penalty(path)
}

fn log_score(board: &Board) -> f64 {
    if board.score() == 0 {
        0.0
    } else {
        (board.score() as f64).log2()
    }
}

fn full_max_row(board: &Board) -> f64 {
    let (row, _) = board.max_tile_position();
    let empty = (0..board.size()).filter(|&c| board.get(row, c) == 0).count();
    -(empty as f64)
}

/// Linear coefficients per feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct Weights {
    weights: BTreeMap<Feature, f64>,
}

impl Weights {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mapping that only looks at `feature`.
    pub fn single(feature: Feature) -> Self {
        Self::new().with(feature, 1.0)
    }

    pub fn with(mut self, feature: Feature, weight: f64) -> Self {
        self.weights.insert(feature, weight);
        self
    }

    /// Builds weights from feature names. Unknown names are logged and skipped.
    pub fn from_names<S: AsRef<str>>(entries: impl IntoIterator<Item = (S, f64)>) -> Self {
        let mut weights = BTreeMap::new();
        for (name, weight) in entries {
            match name.as_ref().parse::<Feature>() {
                Ok(feature) => {
                    weights.insert(feature, weight);
                }
                Err(e) => warn!("ignoring weight {weight}: {e}"),
            }
        }
        Self { weights }
    }

    /// Parses a JSON object of `name: weight` pairs.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.weights.get(&feature).copied()
    }

    pub fn set(&mut self, feature: Feature, weight: f64) {
        self.weights.insert(feature, weight);
    }

    /// Adds `delta` to an existing weight.
    pub fn adjust(&mut self, feature: Feature, delta: f64) {
        if let Some(w) = self.weights.get_mut(&feature) {
            *w += delta;
        }
    }

    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.weights.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.weights.iter().map(|(&f, &w)| (f, w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl From<BTreeMap<String, f64>> for Weights {
    fn from(map: BTreeMap<String, f64>) -> Self {
        Self::from_names(map)
    }
}

impl From<Weights> for BTreeMap<String, f64> {
    fn from(weights: Weights) -> Self {
        weights
            .weights
            .into_iter()
            .map(|(f, w)| (f.name().to_string(), w))
            .collect()
    }
}

/// Weighted sum of the features whose weight is positive.
pub fn evaluate(board: &Board, weights: &Weights) -> f64 {
    weights
        .iter()
        .filter(|&(_, w)| w > 0.0)
        .map(|(f, w)| w * f.compute(board))
        .sum()
}

/// The default weight set shared by baselines and tests.
pub fn uniform_weights() -> Weights {
    Weights::new()
        .with(Feature::Score, 1.0)
        .with(Feature::MaxTile, 1.0)
        .with(Feature::NumEmpty, 1.0)
        .with(Feature::MaxTileCorner, 1.0)
        .with(Feature::TileDiff, 13.0)
        .with(Feature::Monotonicity, 25.0)
        .with(Feature::SnakeMonotonicity, 10.0)
        .with(Feature::LogScore, 0.0)
        .with(Feature::FullMaxRow, 23.0)
}
