//! Cross-entropy method training for discrete, episodic environments such as
//! FrozenLake, built on the Burn framework.

pub mod checkpoint;
pub mod config;
pub mod env;
pub mod episode;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod ml;
pub mod sampler;
pub mod trainer;
pub mod visualize;

pub use crate::checkpoint::{CheckpointLabel, CheckpointSink, FileCheckpointer, NoopCheckpoints};
pub use crate::config::{CrossEntropyConfig, LakeConfig, MapKind, PoolRetention};
pub use crate::env::{Environment, FrozenLake, LakeMap, Move, OneHot, Space, Transition};
pub use crate::episode::{Episode, EpisodePool, EpisodeStep, Observation};
pub use crate::error::{EnvError, TrainError};
pub use crate::filter::{EliteSelection, discounted_score, filter_elite, percentile};
pub use crate::metrics::{CsvMetrics, MemoryMetrics, MetricsSink, NoopMetrics};
pub use crate::ml::{DEFAULT_HIDDEN, EliteBatch, PolicyNetwork, PolicyTrainer};
pub use crate::sampler::{EpisodeSampler, StochasticPolicy, UniformPolicy};
pub use crate::trainer::{CrossEntropyTrainer, IterationReport, LoopState, TrainingSummary};
pub use crate::visualize::{render_lake, render_training_curves};
