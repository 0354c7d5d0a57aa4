use log::{debug, trace};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use super::Agent;
use crate::{
    board::Board,
    evaluator::{evaluate, Feature, Weights},
    Move,
};

/// Linear approximate Q-learning over the evaluator features.
///
/// The value of taking a move is the weighted feature score of the board it
/// leads to. After each observed transition the weights move along the
/// temporal-difference error:
///
/// ```text
/// delta  = reward + gamma * max_a Q(current, a) - Q(previous, previous_move)
/// w[f]  += alpha * delta * f(current)
/// ```
#[derive(Debug, Clone)]
pub struct AdaptiveAgent {
    weights: Weights,
    alpha: f64,
    gamma: f64,
    epsilon: f64,
    previous: Option<(Board, Move)>,
    rng: StdRng,
}

impl AdaptiveAgent {
    pub fn new(weights: Weights, alpha: f64, gamma: f64, epsilon: f64) -> Self {
        Self {
            weights,
            alpha,
            gamma,
            epsilon,
            previous: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// The transition waiting for its update, if any.
    pub fn previous(&self) -> Option<&(Board, Move)> {
        self.previous.as_ref()
    }

    pub fn q_value(&mut self, state: &Board, mv: Move) -> f64 {
        let next = state.successor_with(&mut self.rng, mv);
        evaluate(&next, &self.weights)
    }

    fn best_q_value(&mut self, state: &Board) -> Option<(Move, f64)> {
        let mut best: Option<(Move, f64)> = None;
        for mv in state.valid_moves() {
            let q = self.q_value(state, mv);
            if best.map_or(true, |(_, v)| q > v) {
                best = Some((mv, q));
            }
        }
        best
    }

    /// Applies the TD update for the transition `previous --previous_move--> current`.
    pub fn update(&mut self, previous: &Board, previous_move: Move, current: &Board) {
        let reward = current.score() as f64 - previous.score() as f64;
        let future = self.best_q_value(current).map_or(0.0, |(_, q)| q);
        let delta = reward + self.gamma * future - self.q_value(previous, previous_move);

        let features: Vec<Feature> = self.weights.features().collect();
        for feature in features {
            self.weights
                .adjust(feature, self.alpha * delta * feature.compute(current));
        }
        trace!("td update: reward {reward}, delta {delta:.3}");
    }
}

impl Agent for AdaptiveAgent {
    fn name(&self) -> &str {
        "adaptive"
    }

    fn choose_move(&mut self, board: &Board) -> Option<Move> {
        if let Some((previous, previous_move)) = self.previous.take() {
            self.update(&previous, previous_move, board);
        }

        let moves = board.valid_moves();
        let mv = if self.rng.gen::<f64>() < self.epsilon {
            *moves.choose(&mut self.rng)?
        } else {
            self.best_q_value(board)?.0
        };
        debug!("adaptive picked {mv}");

        self.previous = Some((board.clone(), mv));
        Some(mv)
    }

    /// Learns from the final transition and forgets it, so the next game
    /// starts without a stale update.
    fn game_over(&mut self, board: &Board) {
        if let Some((previous, previous_move)) = self.previous.take() {
            self.update(&previous, previous_move, board);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_board;

    fn agent(weights: Weights) -> AdaptiveAgent {
        AdaptiveAgent::new(weights, 0.1, 0.8, 0.0).with_seed(5)
    }

    #[test]
    fn first_move_performs_no_update() {
        let board = create_board!(
            2 2 0 0
            0 0 0 0
            0 0 0 0
            0 0 0 0
        );
        let weights = Weights::single(Feature::NumEmpty);
        let mut agent = agent(weights.clone());
        let mv = agent.choose_move(&board).unwrap();
        assert_eq!(agent.weights(), &weights);
        assert_eq!(agent.previous(), Some(&(board, mv)));
    }

    #[test]
    fn update_follows_td_rule() {
        let previous = create_board!(
            2 4
            0 8
        );
        // full and without pairs, so the future term is zero
        let current = create_board!(
            2 4
            4 8
        )
        .with_score(4);
        assert!(current.is_game_over());
        let mut agent = agent(Weights::single(Feature::MaxTile));

        // DOWN from `previous` keeps 8 as the max tile whatever spawns, so
        // Q(previous, DOWN) = 8 and delta = 4 + 0.8 * 0 - 8
        agent.update(&previous, Move::Down, &current);
        let expected = 1.0 + 0.1 * -4.0 * 8.0;
        assert!((agent.weights().get(Feature::MaxTile).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn game_over_clears_the_transition() {
        let board = create_board!(
            2 2 0 0
            0 0 0 0
            0 0 0 0
            0 0 0 0
        );
        let mut agent = agent(Weights::single(Feature::Score));
        agent.choose_move(&board).unwrap();
        assert!(agent.previous().is_some());

        let over = create_board!(2 4 4 2);
        agent.game_over(&over);
        assert!(agent.previous().is_none());
        assert_eq!(agent.choose_move(&over), None);
        assert!(agent.previous().is_none());
    }

    #[test]
    fn full_exploration_still_picks_valid_moves() {
        let board = create_board!(
            2 4 2 4
            4 2 4 2
            2 4 2 4
            4 2 8 8
        );
        let mut agent = AdaptiveAgent::new(Weights::single(Feature::Score), 0.1, 0.8, 1.0).with_seed(6);
        for _ in 0..10 {
            agent.previous = None;
            let mv = agent.choose_move(&board).unwrap();
            assert!(matches!(mv, Move::Left | Move::Right));
        }
    }
}
