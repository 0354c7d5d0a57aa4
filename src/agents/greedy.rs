use log::debug;

use super::Agent;
use crate::{
    board::Board,
    evaluator::{evaluate, Weights},
    Move,
};

/// One-ply agent: takes the move whose shifted board evaluates best.
///
/// Only the deterministic shift is scored, the spawn that follows is ignored.
#[derive(Debug, Clone)]
pub struct GreedyAgent {
    weights: Weights,
}

impl GreedyAgent {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }
}

/// Best move by afterstate evaluation. Ties keep the earliest move.
pub(crate) fn best_afterstate(board: &Board, weights: &Weights) -> Option<(Move, f64)> {
    let mut best: Option<(Move, f64)> = None;
    for mv in board.valid_moves() {
        let mut after = board.clone();
        after.shift(mv);
        let value = evaluate(&after, weights);
        if best.map_or(true, |(_, v)| value > v) {
            best = Some((mv, value));
        }
    }
    best
}

impl Agent for GreedyAgent {
    fn name(&self) -> &str {
        "greedy"
    }

    fn choose_move(&mut self, board: &Board) -> Option<Move> {
        let (mv, value) = best_afterstate(board, &self.weights)?;
        debug!("greedy picked {mv} ({value:.2})");
        Some(mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_board, evaluator::Feature};

    #[test]
    fn takes_the_merge() {
        let board = create_board!(
            0 0 0 0
            0 0 0 0
            0 0 0 0
            0 0 2 2
        );
        let mut agent = GreedyAgent::new(Weights::single(Feature::Score));
        // LEFT and RIGHT both merge for 4 points, LEFT comes first
        assert_eq!(agent.choose_move(&board), Some(Move::Left));
    }

    #[test]
    fn prefers_the_corner() {
        let board = create_board!(
            0 0 0 0
            0 0 0 0
            0 0 0 0
            8 0 0 0
        );
        let mut agent = GreedyAgent::new(Weights::single(Feature::MaxTileCorner));
        assert_eq!(agent.choose_move(&board), Some(Move::Right));
    }
}
