use std::{
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc},
    thread,
    time::{Duration, Instant},
};

use csta::prelude::*;
use log::{debug, error, info, warn};
use rand::{thread_rng, Rng};

use crate::{agents::Agent, board::Board, config::Configuration, Move};

/// Tile that counts as a won game.
pub const WINNING_TILE: u32 = 2048;

/// What the driving loop observes on every turn, before the move is applied.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub trial: usize,
    pub turn: usize,
    pub grid: Vec<Vec<u32>>,
    pub score: u64,
    pub chosen: Move,
    pub decision_time: Duration,
    pub last_spawn: Option<(usize, usize)>,
}

/// End-of-game results collected over many trials.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialResults {
    scores: Vec<u64>,
    max_tiles: Vec<u32>,
    turns: Vec<usize>,
}

impl TrialResults {
    pub fn add_score(&mut self, score: u64) {
        self.scores.push(score);
    }

    pub fn add_max_tile(&mut self, tile: u32) {
        self.max_tiles.push(tile);
    }

    pub fn add_turns(&mut self, turns: usize) {
        self.turns.push(turns);
    }

    pub fn merge(&mut self, other: &mut TrialResults) {
        self.scores.append(&mut other.scores);
        self.max_tiles.append(&mut other.max_tiles);
        self.turns.append(&mut other.turns);
    }

    pub fn scores(&self) -> &[u64] {
        &self.scores
    }

    pub fn max_tiles(&self) -> &[u32] {
        &self.max_tiles
    }

    pub fn turns(&self) -> &[usize] {
        &self.turns
    }

    pub fn games(&self) -> usize {
        self.scores.len()
    }

    pub fn mean_score(&self) -> f64 {
        mean(self.scores.iter().map(|&s| s as f64))
    }

    pub fn mean_max_tile(&self) -> f64 {
        mean(self.max_tiles.iter().map(|&t| t as f64))
    }

    /// Number of games that ended with each max tile.
    pub fn max_tile_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for &tile in &self.max_tiles {
            *counts.entry(tile).or_insert(0) += 1;
        }
        counts
    }

    pub fn wins(&self) -> usize {
        self.max_tiles.iter().filter(|&&t| t >= WINNING_TILE).count()
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Plays `board` to the end with `agent`, reporting every turn to `observer`.
///
/// Score and max tile are recorded in `results` exactly once, when the game
/// is over or when the agent gives up while moves remain.
pub fn play_game<A, F>(
    agent: &mut A,
    board: &mut Board,
    results: &mut TrialResults,
    trial: usize,
    observer: F,
) where
    A: Agent + ?Sized,
    F: FnMut(&TurnRecord),
{
    play_game_with(&mut thread_rng(), agent, board, results, trial, observer);
}

/// [`play_game`] with tile spawns drawn from `rng`.
pub fn play_game_with<R, A, F>(
    rng: &mut R,
    agent: &mut A,
    board: &mut Board,
    results: &mut TrialResults,
    trial: usize,
    mut observer: F,
) where
    R: Rng + ?Sized,
    A: Agent + ?Sized,
    F: FnMut(&TurnRecord),
{
    let mut turn = 0;
    while !board.is_game_over() {
        let start = Instant::now();
        let chosen = agent.choose_move(board);
        let decision_time = start.elapsed();

        let Some(chosen) = chosen else {
            warn!("{} returned no move with {:?} available", agent.name(), board.valid_moves());
            break;
        };

        observer(&TurnRecord {
            trial,
            turn,
            grid: board.grid(),
            score: board.score(),
            chosen,
            decision_time,
            last_spawn: board.last_spawn(),
        });

        if !board.apply_move_with(rng, chosen) {
            warn!("{} chose {chosen}, which does not change the board", agent.name());
            break;
        }
        turn += 1;
    }

    results.add_score(board.score());
    results.add_max_tile(board.max_tile());
    results.add_turns(turn);
    agent.game_over(board);
    debug!(
        "trial {trial} ({}): score {}, max tile {}, {turn} turns",
        agent.name(),
        board.score(),
        board.max_tile()
    );
}

#[derive(Debug)]
struct Batch {
    id: usize,
    n_games: usize,
    result: TrialResults,
}

impl Batch {
    fn new(id: usize, n_games: usize) -> Self {
        Self {
            id,
            n_games,
            result: TrialResults::default(),
        }
    }

    fn run<A: Agent>(&mut self, agent: &mut A) {
        let mc = MonteCarlo::default();
        let mut trial = self.id * self.n_games;
        mc.sample_iter(self.n_games).for_each(|mut board: Board| {
            play_game(&mut *agent, &mut board, &mut self.result, trial, |_| {});
            trial += 1;
        });
        info!("({}) batch {: >3} ended", agent.name(), self.id);
    }
}

/// Runs batches of games across worker threads.
///
/// Each batch builds its own agent from the factory, plays `n_games` fresh
/// 4×4 games and sends its [`TrialResults`] back over a channel. A new batch
/// starts whenever one finishes, until `batches` have run.
pub struct Controller {
    pub n_threads: usize,
    pub n_games: usize,
    pub batches: usize,
    pub log_to_file: bool,
}

impl Controller {
    pub fn new(batches: usize, n_games: usize) -> Self {
        Self {
            n_threads: thread::available_parallelism().map(usize::from).unwrap_or(1),
            n_games,
            batches,
            log_to_file: false,
        }
    }

    /// One single-game batch per configured trial.
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            n_threads: config.threads(),
            n_games: 1,
            batches: config.trials(),
            log_to_file: config.log_to_file(),
        }
    }

    pub fn launch<A, F>(&self, factory: F) -> TrialResults
    where
        A: Agent + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let now = Instant::now();
        let factory = Arc::new(factory);
        let mut pending = 0..self.batches;

        let (sender, receiver) = mpsc::channel();
        let mut sender = Some(sender);

        // a panicking batch still reports, so the scheduler never waits on it
        let spawn_batch = |id: usize, sender: mpsc::Sender<(usize, Option<TrialResults>)>| {
            let factory = Arc::clone(&factory);
            let mut batch = Batch::new(id, self.n_games);
            thread::spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut agent = factory();
                    batch.run(&mut agent);
                    batch.result
                }));
                sender.send((id, outcome.ok()))
            });
        };

        for _ in 0..self.n_threads.max(1) {
            match (pending.next(), &sender) {
                (Some(id), Some(tx)) => spawn_batch(id, tx.clone()),
                _ => break,
            }
        }
        if pending.len() == 0 {
            sender = None;
        }

        let mut total = TrialResults::default();
        for (id, result) in receiver {
            match result {
                Some(mut result) => total.merge(&mut result),
                None => error!("batch {id} panicked, its games are not counted"),
            }

            if let (Some(id), Some(tx)) = (pending.next(), &sender) {
                spawn_batch(id, tx.clone());
            }
            if pending.len() == 0 {
                sender = None;
            }
        }

        info!(
            "{} games in {:?}: mean score {:.1}, mean max tile {:.1}, {} wins",
            total.games(),
            now.elapsed(),
            total.mean_score(),
            total.mean_max_tile(),
            total.wins()
        );
        if self.log_to_file {
            file_log::log!("mean_score", "{}", total.mean_score());
            file_log::log!("mean_max_tile", "{}", total.mean_max_tile());
            file_log::log!("victories", "{}", total.wins());
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agents::{ExpectimaxAgent, GreedyAgent, RandomAgent},
        create_board,
        evaluator::{uniform_weights, Feature, Weights},
    };
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn play_game_records_results_once() {
        let mut board = Board::new(4);
        let mut agent = RandomAgent::with_seed(1);
        let mut results = TrialResults::default();
        let mut turns = Vec::new();
        play_game(&mut agent, &mut board, &mut results, 3, |record| {
            turns.push((record.trial, record.turn, record.score))
        });

        assert!(board.is_game_over());
        assert_eq!(results.scores(), &[board.score()]);
        assert_eq!(results.max_tiles(), &[board.max_tile()]);
        assert_eq!(results.turns(), &[turns.len()]);
        assert!(turns.iter().all(|&(trial, _, _)| trial == 3));
        assert!(turns.windows(2).all(|w| w[0].2 <= w[1].2 && w[0].1 + 1 == w[1].1));
    }

    #[test]
    fn finished_board_is_recorded_without_turns() {
        let mut board = create_board!(2 4 4 2);
        let mut agent = GreedyAgent::new(uniform_weights());
        let mut results = TrialResults::default();
        play_game(&mut agent, &mut board, &mut results, 0, |_| panic!("no turn expected"));
        assert_eq!(results.scores(), &[0]);
        assert_eq!(results.max_tiles(), &[4]);
        assert_eq!(results.turns(), &[0]);
    }

    #[test]
    fn results_merge_and_summarise() {
        let mut a = TrialResults::default();
        a.add_score(100);
        a.add_max_tile(64);
        let mut b = TrialResults::default();
        b.add_score(300);
        b.add_max_tile(2048);
        b.add_score(200);
        b.add_max_tile(64);

        a.merge(&mut b);
        assert_eq!(a.games(), 3);
        assert!(b.scores().is_empty());
        assert_eq!(a.mean_score(), 200.0);
        assert_eq!(a.wins(), 1);
        assert_eq!(a.max_tile_counts(), BTreeMap::from([(64, 2), (2048, 1)]));
        assert_eq!(TrialResults::default().mean_score(), 0.0);
    }

    #[test]
    fn controller_runs_every_batch() {
        let controller = Controller {
            n_threads: 2,
            n_games: 2,
            batches: 3,
            log_to_file: false,
        };
        let results = controller.launch(|| GreedyAgent::new(Weights::single(Feature::NumEmpty)));
        assert_eq!(results.games(), 6);
        assert!(results.max_tiles().iter().all(|&t| t >= 4));
    }

    struct PanickingAgent;

    impl Agent for PanickingAgent {
        fn name(&self) -> &str {
            "panicking"
        }

        fn choose_move(&mut self, _board: &Board) -> Option<Move> {
            panic!("agent failure");
        }
    }

    #[test]
    fn controller_survives_panicking_batches() {
        let controller = Controller {
            n_threads: 2,
            n_games: 1,
            batches: 4,
            log_to_file: false,
        };
        let results = controller.launch(|| PanickingAgent);
        assert_eq!(results.games(), 0);
    }

    #[test]
    fn seeded_games_replay_exactly() {
        let play = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut board = Board::new_with(4, &mut rng);
            let mut agent = GreedyAgent::new(uniform_weights());
            let mut results = TrialResults::default();
            let mut moves = Vec::new();
            play_game_with(&mut rng, &mut agent, &mut board, &mut results, 0, |record| {
                moves.push(record.chosen)
            });
            (board, moves)
        };
        assert_eq!(play(17), play(17));
    }

    #[test]
    fn controller_with_no_batches_returns_empty() {
        let controller = Controller::new(0, 1);
        let results = controller.launch(|| ExpectimaxAgent::new(1, uniform_weights()));
        assert_eq!(results.games(), 0);
    }
}
