//! # ai2048
//!
//! A 2048 engine together with a family of agents that play it on their own.
//!
//! - [`board::Board`] owns the grid, the score and the shift/merge/spawn mechanics.
//! - [`evaluator`] turns a board into a scalar through a weighted sum of named features.
//! - [`agents`] contains the decision makers: random, greedy, expectimax,
//!   Monte Carlo and an adaptive agent that learns its weights online.
//! - [`sim`] drives games turn by turn and runs batches of trials across threads.
//!
//! ```no_run
//! use ai2048::prelude::*;
//!
//! let mut agent = ExpectimaxAgent::new(2, uniform_weights());
//! let mut results = TrialResults::default();
//! let mut board = Board::new(4);
//! play_game(&mut agent, &mut board, &mut results, 0, |_| {});
//! println!("{:?}", results.scores());
//! ```

use std::{fmt, str::FromStr};

use csta::prelude::*;
use csta_derive::Randomizable;
use rand::prelude::*;

pub mod agents;
pub mod board;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod logging;
pub mod optimizer;
pub mod sim;

pub use error::{GameError, Result};

pub mod prelude {
    pub use crate::agents::{
        AdaptiveAgent, Agent, ExpectimaxAgent, GreedyAgent, MonteCarloAgent, RandomAgent,
        RolloutPolicy,
    };
    pub use crate::board::Board;
    pub use crate::config::Configuration;
    pub use crate::error::{GameError, Result};
    pub use crate::evaluator::{evaluate, uniform_weights, Feature, Weights};
    pub use crate::sim::{play_game, play_game_with, Controller, TrialResults, TurnRecord};
    pub use crate::Move;
}

/// A sliding direction.
///
/// [`Move::ALL`] is the canonical order used everywhere moves are enumerated,
/// so ties in search are always broken the same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Randomizable)]
pub enum Move {
    Left,
    Right,
    Up,
    Down,
}

impl Move {
    pub const ALL: [Move; 4] = [Move::Left, Move::Right, Move::Up, Move::Down];

    pub fn as_str(&self) -> &'static str {
        match self {
            Move::Left => "LEFT",
            Move::Right => "RIGHT",
            Move::Up => "UP",
            Move::Down => "DOWN",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Move {
    type Err = GameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LEFT" => Ok(Move::Left),
            "RIGHT" => Ok(Move::Right),
            "UP" => Ok(Move::Up),
            "DOWN" => Ok(Move::Down),
            _ => Err(GameError::UnknownMove(s.to_string())),
        }
    }
}

/// Builds a square [`board::Board`] from its cell values in row-major order.
///
/// Panics if the number of cells is not a perfect square or a value is not
/// zero or a power of two.
#[macro_export]
macro_rules! create_board {
    ( $( $i:tt )+ ) => {
        $crate::board::Board::from_cells(vec![ $( $i, )+ ])
            .expect("board literal must be a square grid of powers of two")
    };
}
