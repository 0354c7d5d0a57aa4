/// Errors raised by the game engine and its configuration layer.
///
/// Board variants describe caller defects (placing on an occupied cell,
/// indexing outside the grid, spawning into a full board). They are returned
/// immediately and never retried.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("tried to place a tile on non-empty cell ({row}, {col})")]
    OccupiedCell { row: usize, col: usize },

    #[error("cell ({row}, {col}) is outside a {size}x{size} board")]
    OutOfBounds { row: usize, col: usize, size: usize },

    #[error("cannot spawn {requested} tiles with only {available} empty cells")]
    NotEnoughEmpty { requested: usize, available: usize },

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("invalid move {0:?}: only LEFT, RIGHT, UP and DOWN are permitted")]
    UnknownMove(String),

    #[error("unknown evaluator feature {0:?}")]
    UnknownFeature(String),

    #[error("unknown agent kind {0:?}")]
    UnknownAgent(String),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("logger error: {0}")]
    Logger(#[from] flexi_logger::FlexiLoggerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GameError>;
