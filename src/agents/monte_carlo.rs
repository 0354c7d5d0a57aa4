use std::{sync::mpsc, thread};

use csta::prelude::*;
use log::debug;
use rand::{distributions::Standard, rngs::StdRng, Rng, SeedableRng};

use super::{greedy::best_afterstate, Agent};
use crate::{board::Board, evaluator::Weights, Move};

/// How rollouts choose their moves.
#[derive(Debug, Clone)]
pub enum RolloutPolicy {
    /// Uniform over the valid moves.
    Random,
    /// Greedy on the afterstate evaluation with these weights.
    Heuristic(Weights),
}

/// Scores each candidate move by the mean final score of simulated games.
///
/// With more than one worker, the rollouts of a candidate are split across
/// scoped threads. Each worker plays from its own copy of the board and the
/// mean is taken once every worker has reported.
#[derive(Debug, Clone)]
pub struct MonteCarloAgent {
    rollouts: usize,
    horizon: Option<usize>,
    workers: usize,
    policy: RolloutPolicy,
    rng: StdRng,
    name: String,
}

impl MonteCarloAgent {
    pub fn new(rollouts: usize) -> Self {
        assert!(rollouts > 0, "at least one rollout is needed");
        Self {
            rollouts,
            horizon: None,
            workers: 1,
            policy: RolloutPolicy::Random,
            rng: StdRng::from_entropy(),
            name: "monte-carlo".into(),
        }
    }

    /// Rollouts guided by the greedy heuristic instead of random play.
    pub fn combined(rollouts: usize, weights: Weights) -> Self {
        let mut agent = Self::new(rollouts);
        agent.policy = RolloutPolicy::Heuristic(weights);
        agent.name = "combo-monte-carlo".into();
        agent
    }

    /// Caps every rollout at `horizon` moves. `None` plays until game over.
    pub fn with_horizon(mut self, horizon: Option<usize>) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn mean_score(&mut self, board: &Board, mv: Move) -> f64 {
        let scores: Vec<u64> = if self.workers <= 1 {
            (0..self.rollouts)
                .map(|_| rollout(&self.policy, self.horizon, board, mv, &mut self.rng))
                .collect()
        } else {
            self.parallel_rollouts(board, mv)
        };
        scores.iter().sum::<u64>() as f64 / scores.len() as f64
    }

    fn parallel_rollouts(&mut self, board: &Board, mv: Move) -> Vec<u64> {
        let (sender, receiver) = mpsc::channel();
        let policy = &self.policy;
        let horizon = self.horizon;

        thread::scope(|s| {
            for worker in 0..self.workers {
                let share = self.rollouts / self.workers
                    + usize::from(worker < self.rollouts % self.workers);
                let seed: u64 = self.rng.gen();
                let sender = sender.clone();
                s.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    let scores: Vec<u64> = (0..share)
                        .map(|_| rollout(policy, horizon, board, mv, &mut rng))
                        .collect();
                    sender
                        .send(scores)
                        .expect("receiver outlives the rollout scope");
                });
            }
        });
        drop(sender);

        receiver.into_iter().flatten().collect()
    }
}

/// Plays `mv` and then follows `policy` until the game ends or `horizon`
/// further moves were made. Returns the final score.
fn rollout<R: Rng + ?Sized>(
    policy: &RolloutPolicy,
    horizon: Option<usize>,
    board: &Board,
    mv: Move,
    rng: &mut R,
) -> u64 {
    let mut game = board.successor_with(rng, mv);
    let mut steps = 0;

    while !game.is_game_over() && horizon.map_or(true, |h| steps < h) {
        let next = match policy {
            RolloutPolicy::Random => Some(random_valid_move(&game, rng)),
            RolloutPolicy::Heuristic(weights) => best_afterstate(&game, weights).map(|(m, _)| m),
        };
        let Some(next) = next else {
            break;
        };
        game.apply_move_with(rng, next);
        steps += 1;
    }
    game.score()
}

/// Samples moves from `rng` until one is valid. `game` must not be over.
fn random_valid_move<R: Rng + ?Sized>(game: &Board, rng: &mut R) -> Move {
    loop {
        let candidate = <Move as Randomizable>::sample(&Standard, rng);
        if game.is_valid(candidate) {
            return candidate;
        }
    }
}

impl Agent for MonteCarloAgent {
    fn name(&self) -> &str {
        &self.name
    }

    /// Only a candidate whose mean beats the current score is taken.
    fn choose_move(&mut self, board: &Board) -> Option<Move> {
        let mut best = None;
        let mut best_value = board.score() as f64;
        for mv in board.valid_moves() {
            let mean = self.mean_score(board, mv);
            debug!("{} {mv}: mean {mean:.1} over {} rollouts", self.name, self.rollouts);
            if mean > best_value {
                best_value = mean;
                best = Some(mv);
            }
        }
        best
    }
}
