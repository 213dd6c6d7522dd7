use thiserror::Error;

/// Errors raised by environments when driven incorrectly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("action {action} is out of range for {n_actions} actions")]
    InvalidAction { action: usize, n_actions: usize },
    #[error("episode is finished; call reset before stepping")]
    EpisodeFinished,
    #[error("invalid map: {0}")]
    InvalidMap(&'static str),
    #[error("unsupported space: {0}")]
    UnsupportedSpace(&'static str),
}

/// Errors that can occur while sampling, filtering or training.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("episode must contain at least one step")]
    EmptyEpisode,
    #[error("cannot train on an empty set of examples")]
    EmptyTrainingSet,
    #[error("invalid action distribution: {0}")]
    InvalidDistribution(String),
    #[error("tensor conversion failed: {0}")]
    Tensor(String),
    #[error("environment error: {0}")]
    Env(#[from] EnvError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("recorder error: {0}")]
    Recorder(#[from] burn::record::RecorderError),
    #[error("plotting failed: {0}")]
    Plot(String),
    #[error("training loop already terminated at iteration {0}")]
    Terminated(usize),
}
