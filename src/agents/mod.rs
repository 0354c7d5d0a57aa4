//! Decision makers that play a [`Board`] one move at a time.
//!
//! Agents only choose moves. Applying them and recording results belongs to
//! the driving loop in [`crate::sim`].

use crate::{board::Board, Move};

mod adaptive;
mod expectimax;
mod greedy;
mod monte_carlo;
mod random;

pub use adaptive::AdaptiveAgent;
pub use expectimax::ExpectimaxAgent;
pub use greedy::GreedyAgent;
pub use monte_carlo::{MonteCarloAgent, RolloutPolicy};
pub use random::RandomAgent;

pub trait Agent {
    fn name(&self) -> &str;

    /// Picks the next move, or `None` when no action is possible.
    fn choose_move(&mut self, board: &Board) -> Option<Move>;

    /// Called once with the final board when a game ends.
    fn game_over(&mut self, _board: &Board) {}
}

impl<A: Agent + ?Sized> Agent for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn choose_move(&mut self, board: &Board) -> Option<Move> {
        (**self).choose_move(board)
    }

    fn game_over(&mut self, board: &Board) {
        (**self).game_over(board)
    }
}
