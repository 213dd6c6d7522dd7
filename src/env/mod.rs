//! Environment contract consumed by the episode sampler, plus the FrozenLake
//! grid world and the one-hot observation wrapper used for training.

pub mod frozen_lake;
pub mod one_hot;

use serde::{Deserialize, Serialize};

use crate::error::EnvError;

pub use frozen_lake::{FrozenLake, FrozenLakeBuilder, LakeMap, Move, Tile};
pub use one_hot::OneHot;

/// Shape of an observation or action space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Space {
    /// Integers in `[0, n)`.
    Discrete { n: usize },
    /// Fixed-length float vectors bounded by `low..=high`.
    Box { len: usize, low: f32, high: f32 },
}

impl Space {
    /// Number of values in a discrete space.
    pub fn cardinality(&self) -> Option<usize> {
        match self {
            Space::Discrete { n } => Some(*n),
            Space::Box { .. } => None,
        }
    }

    /// Length of the flat vector a model consumes for this space.
    pub fn flat_dim(&self) -> usize {
        match self {
            Space::Discrete { n } => *n,
            Space::Box { len, .. } => *len,
        }
    }
}

/// Auxiliary data reported alongside each transition.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct StepInfo {
    /// Probability of the transition that actually happened.
    pub probability: f32,
    /// Set when the episode ended because of a time limit.
    pub truncated: bool,
}

/// Outcome of a single environment step.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<O> {
    pub observation: O,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// Episodic environment with a discrete action space.
pub trait Environment {
    type Observation: Clone;

    fn observation_space(&self) -> Space;

    fn action_space(&self) -> Space;

    fn reset(&mut self) -> Self::Observation;

    fn step(&mut self, action: usize) -> Result<Transition<Self::Observation>, EnvError>;
}
