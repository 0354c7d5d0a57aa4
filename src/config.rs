//! Agent and controller settings.
//!
//! A [`Configuration`] is built programmatically with [`Configuration::new()`]
//! and the `with_*` setters, or from environment variables with
//! [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Unset or unparsable values keep their default.
//!
//! - `AI2048_AGENT`: agent kind: `random`, `greedy`, `expectimax`,
//!   `monte-carlo`, `combo-monte-carlo` or `adaptive` (default: `expectimax`)
//! - `AI2048_DEPTH`: expectimax search depth (default: `2`)
//! - `AI2048_EPSILON`: exploration probability of the adaptive agent (default: `0.05`)
//! - `AI2048_ALPHA`: learning rate of the adaptive agent (default: `0.01`)
//! - `AI2048_GAMMA`: discount factor of the adaptive agent (default: `0.8`)
//! - `AI2048_ROLLOUTS`: rollouts per candidate move (default: `20`)
//! - `AI2048_HORIZON`: moves per rollout, unbounded when unset
//! - `AI2048_WORKERS`: rollout threads per decision (default: `1`)
//! - `AI2048_TRIALS`: games to play (default: `10`)
//! - `AI2048_THREADS`: games played in parallel (default: available parallelism)
//! - `AI2048_LOG_FILE`: set to `"true"` to append batch summaries to files (default: `false`)
//! - `AI2048_WEIGHTS`: JSON file with the evaluator weights (default: uniform weights)

use std::{path::PathBuf, str::FromStr, thread};

use crate::{
    agents::{
        AdaptiveAgent, Agent, ExpectimaxAgent, GreedyAgent, MonteCarloAgent, RandomAgent,
    },
    error::{GameError, Result},
    evaluator::{uniform_weights, Weights},
};

/// Which agent a [`Configuration`] builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Random,
    Greedy,
    Expectimax,
    MonteCarlo,
    ComboMonteCarlo,
    Adaptive,
}

impl FromStr for AgentKind {
    type Err = GameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(AgentKind::Random),
            "greedy" => Ok(AgentKind::Greedy),
            "expectimax" => Ok(AgentKind::Expectimax),
            "monte-carlo" => Ok(AgentKind::MonteCarlo),
            "combo-monte-carlo" => Ok(AgentKind::ComboMonteCarlo),
            "adaptive" => Ok(AgentKind::Adaptive),
            _ => Err(GameError::UnknownAgent(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) agent: AgentKind,
    pub(crate) depth: usize,
    pub(crate) epsilon: f64,
    pub(crate) alpha: f64,
    pub(crate) gamma: f64,
    pub(crate) rollouts: usize,
    pub(crate) rollout_horizon: Option<usize>,
    pub(crate) workers: usize,
    pub(crate) trials: usize,
    pub(crate) threads: usize,
    pub(crate) log_to_file: bool,
    pub(crate) weights_path: Option<PathBuf>,
}

impl Configuration {
    /// Default parameters: a depth-2 expectimax agent over the uniform
    /// weights, playing 10 games on every available core.
    pub fn new() -> Self {
        Self {
            agent: AgentKind::Expectimax,
            depth: 2,
            epsilon: 0.05,
            alpha: 0.01,
            gamma: 0.8,
            rollouts: 20,
            rollout_horizon: None,
            workers: 1,
            trials: 10,
            threads: thread::available_parallelism().map(usize::from).unwrap_or(1),
            log_to_file: false,
            weights_path: None,
        }
    }

    pub fn from_env() -> Self {
        fn get_env<T: FromStr>(var: &str, default: T) -> T {
            std::env::var(var)
                .ok()
                .and_then(|val| val.parse().ok())
                .unwrap_or(default)
        }

        let defaults = Self::new();
        Self {
            agent: get_env("AI2048_AGENT", defaults.agent),
            depth: get_env("AI2048_DEPTH", defaults.depth).max(1),
            epsilon: get_env("AI2048_EPSILON", defaults.epsilon),
            alpha: get_env("AI2048_ALPHA", defaults.alpha),
            gamma: get_env("AI2048_GAMMA", defaults.gamma),
            rollouts: get_env("AI2048_ROLLOUTS", defaults.rollouts).max(1),
            rollout_horizon: std::env::var("AI2048_HORIZON")
                .ok()
                .and_then(|val| val.parse().ok()),
            workers: get_env("AI2048_WORKERS", defaults.workers).max(1),
            trials: get_env("AI2048_TRIALS", defaults.trials),
            threads: get_env("AI2048_THREADS", defaults.threads).max(1),
            log_to_file: std::env::var("AI2048_LOG_FILE")
                .map(|val| val.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.log_to_file),
            weights_path: std::env::var_os("AI2048_WEIGHTS").map(PathBuf::from),
        }
    }

    pub fn with_agent(mut self, agent: AgentKind) -> Self {
        self.agent = agent;
        self
    }

    /// Panics on a zero depth.
    pub fn with_depth(mut self, depth: usize) -> Self {
        assert!(depth > 0, "search depth must be positive");
        self.depth = depth;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_rollouts(mut self, rollouts: usize) -> Self {
        assert!(rollouts > 0, "at least one rollout is needed");
        self.rollouts = rollouts;
        self
    }

    pub fn with_rollout_horizon(mut self, horizon: Option<usize>) -> Self {
        self.rollout_horizon = horizon;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_log_to_file(mut self, value: bool) -> Self {
        self.log_to_file = value;
        self
    }

    pub fn with_weights_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.weights_path = Some(path.into());
        self
    }

    pub fn agent(&self) -> AgentKind {
        self.agent
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn log_to_file(&self) -> bool {
        self.log_to_file
    }

    /// Weights from the configured file, or the uniform set when none is given.
    pub fn weights(&self) -> Result<Weights> {
        match &self.weights_path {
            Some(path) => Weights::load(path),
            None => Ok(uniform_weights()),
        }
    }

    /// Builds the configured agent around `weights`.
    pub fn build_agent(&self, weights: Weights) -> Box<dyn Agent> {
        match self.agent {
            AgentKind::Random => Box::new(RandomAgent::new()),
            AgentKind::Greedy => Box::new(GreedyAgent::new(weights)),
            AgentKind::Expectimax => Box::new(ExpectimaxAgent::new(self.depth, weights)),
            AgentKind::MonteCarlo => Box::new(
                MonteCarloAgent::new(self.rollouts)
                    .with_horizon(self.rollout_horizon)
                    .with_workers(self.workers),
            ),
            AgentKind::ComboMonteCarlo => Box::new(
                MonteCarloAgent::combined(self.rollouts, weights)
                    .with_horizon(self.rollout_horizon)
                    .with_workers(self.workers),
            ),
            AgentKind::Adaptive => Box::new(AdaptiveAgent::new(
                weights,
                self.alpha,
                self.gamma,
                self.epsilon,
            )),
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
