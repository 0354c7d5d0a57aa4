use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::Agent;
use crate::{board::Board, Move};

/// Chooses uniformly among the valid moves.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    rng: StdRng,
}

impl RandomAgent {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "random"
    }

    fn choose_move(&mut self, board: &Board) -> Option<Move> {
        board.valid_moves().choose(&mut self.rng).copied()
    }
}
