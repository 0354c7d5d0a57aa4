use log::debug;

use super::Agent;
use crate::{
    board::Board,
    evaluator::{evaluate, Feature, Weights},
    Move,
};

/// Depth-bounded expectimax over decision and spawn-chance nodes.
///
/// Every call searches from scratch; nothing but the depth and the weights
/// persists between moves.
#[derive(Debug, Clone)]
pub struct ExpectimaxAgent {
    depth: usize,
    weights: Weights,
    name: String,
}

impl ExpectimaxAgent {
    pub fn new(depth: usize, weights: Weights) -> Self {
        assert!(depth > 0, "search depth must be positive");
        Self {
            depth,
            weights,
            name: format!("expectimax-{depth}"),
        }
    }

    /// Expectimax that maximises a single feature.
    pub fn single_feature(depth: usize, feature: Feature) -> Self {
        let mut agent = Self::new(depth, Weights::single(feature));
        agent.name = format!("{feature}-expectimax-{depth}");
        agent
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Returns the best move from `state` and its expected value.
    ///
    /// The move is `None` at depth 0 or when the game is over, with the
    /// value being the evaluation of `state` itself. Ties keep the move that
    /// comes first in [`Move::ALL`].
    pub fn find_best_move(&self, state: &Board, depth: usize) -> (Option<Move>, f64) {
        if depth == 0 || state.is_game_over() {
            return (None, evaluate(state, &self.weights));
        }

        let mut best_move = None;
        let mut best_value = f64::NEG_INFINITY;
        for mv in state.valid_moves() {
            let (successors, probs) = state.all_successors(mv);
            let expected: f64 = successors
                .iter()
                .zip(&probs)
                .map(|(next, p)| p * self.find_best_move(next, depth - 1).1)
                .sum();
            if expected > best_value {
                best_value = expected;
                best_move = Some(mv);
            }
        }
        (best_move, best_value)
    }
}

impl Agent for ExpectimaxAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn choose_move(&mut self, board: &Board) -> Option<Move> {
        let (mv, value) = self.find_best_move(board, self.depth);
        debug!("{} picked {mv:?} ({value:.2})", self.name);
        mv
    }
}
