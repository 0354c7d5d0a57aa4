//! Hill climbing over evaluator weights.

use log::info;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::{
    agents::ExpectimaxAgent,
    evaluator::{Feature, Weights},
    sim::Controller,
};

/// Searches for weights that raise the mean max tile of an expectimax agent.
///
/// Every iteration perturbs one random feature of the current weights per
/// neighbour, scores each neighbour and the current weights over `trials`
/// games, and moves to the best one if it improves on the best score so far.
pub struct WeightOptimizer {
    pub trials: usize,
    pub iterations: usize,
    pub neighbors: usize,
    pub depth: usize,
    pub n_threads: usize,
    rng: StdRng,
}

impl WeightOptimizer {
    pub fn new(trials: usize, iterations: usize) -> Self {
        Self {
            trials,
            iterations,
            neighbors: 10,
            depth: 1,
            n_threads: 1,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Copies of `config`, each with one weight shifted by an integer in
    /// `[-5, 5)` and clamped at zero.
    pub fn neighbor_configs(&mut self, config: &Weights) -> Vec<Weights> {
        let features: Vec<Feature> = config.features().collect();
        (0..self.neighbors)
            .map(|_| {
                let mut neighbor = config.clone();
                if let Some(&feature) = features.choose(&mut self.rng) {
                    let step = self.rng.gen_range(-5..5) as f64;
                    let weight = neighbor.get(feature).unwrap_or(0.0) + step;
                    neighbor.set(feature, weight.max(0.0));
                }
                neighbor
            })
            .collect()
    }

    /// Mean max tile reached by an expectimax agent using `config`.
    pub fn config_score(&self, config: &Weights) -> f64 {
        let mut controller = Controller::new(self.trials, 1);
        controller.n_threads = self.n_threads;
        let depth = self.depth;
        let config = config.clone();
        controller
            .launch(move || ExpectimaxAgent::new(depth, config.clone()))
            .mean_max_tile()
    }

    /// Returns the best weights found and their score.
    pub fn run(&mut self, start: Weights) -> (Weights, f64) {
        let mut current = start;
        let mut current_score = 0.0;

        for iteration in 0..self.iterations {
            let mut candidates = self.neighbor_configs(&current);
            candidates.push(current.clone());

            let scores: Vec<f64> = candidates.iter().map(|c| self.config_score(c)).collect();
            let (best, &best_score) = scores
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .unwrap_or((candidates.len() - 1, &current_score));

            if best_score > current_score {
                current = candidates.swap_remove(best);
                current_score = best_score;
            }
            info!("iteration {iteration}: {current_score:.1} with {current:?}");
        }

        (current, current_score)
    }
}
