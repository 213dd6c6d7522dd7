use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::env::{FrozenLake, LakeMap, OneHot};
use crate::error::{EnvError, TrainError};
use crate::ml::DEFAULT_HIDDEN;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_PERCENTILE: f32 = 70.0;
pub const DEFAULT_GAMMA: f32 = 0.9;
pub const DEFAULT_POOL_CAPACITY: usize = 500;
pub const DEFAULT_LEARNING_RATE: f64 = 1.0e-3;
pub const DEFAULT_CHECKPOINT_EVERY: usize = 100;
pub const DEFAULT_SUCCESS_THRESHOLD: f32 = 0.5;
pub const DEFAULT_SEED: u64 = 0xCE11_5EED_0F1A_4E00;

const MAP_SEED_SALT: u64 = 0x4D41_5053;
const SAMPLER_SEED_SALT: u64 = 0x9E37_79B9;

/// Seed for the action sampler's rng, kept apart from the lake's slip rng
/// which is seeded with `seed` itself.
pub fn sampler_seed(seed: u64) -> u64 {
    seed ^ SAMPLER_SEED_SALT
}

/// Which episodes stay in the pool after filtering.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PoolRetention {
    /// Only the elite episodes of the last iteration are carried over.
    Elite,
    /// Every merged episode is carried over, up to the pool capacity.
    All,
}

/// Hyperparameters of the cross-entropy training loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossEntropyConfig {
    pub hidden_size: usize,
    pub batch_size: usize,
    pub percentile: f32,
    pub gamma: f32,
    pub pool_capacity: usize,
    pub learning_rate: f64,
    pub checkpoint_every: usize,
    pub report_every: usize,
    pub success_threshold: f32,
    pub retention: PoolRetention,
    pub seed: u64,
}

impl Default for CrossEntropyConfig {
    fn default() -> Self {
        Self {
            hidden_size: DEFAULT_HIDDEN,
            batch_size: DEFAULT_BATCH_SIZE,
            percentile: DEFAULT_PERCENTILE,
            gamma: DEFAULT_GAMMA,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            learning_rate: DEFAULT_LEARNING_RATE,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            report_every: 1,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            retention: PoolRetention::Elite,
            seed: DEFAULT_SEED,
        }
    }
}

impl CrossEntropyConfig {
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.hidden_size == 0 {
            return Err(TrainError::InvalidConfiguration("hidden size must be positive"));
        }
        if self.batch_size == 0 {
            return Err(TrainError::InvalidConfiguration("batch size must be positive"));
        }
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(TrainError::InvalidConfiguration(
                "percentile must be between 0 and 100",
            ));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(TrainError::InvalidConfiguration("gamma must be in (0, 1]"));
        }
        if self.pool_capacity < self.batch_size {
            return Err(TrainError::InvalidConfiguration(
                "pool capacity must hold at least one batch",
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(TrainError::InvalidConfiguration("learning rate must be positive"));
        }
        if self.checkpoint_every == 0 {
            return Err(TrainError::InvalidConfiguration(
                "checkpoint interval must be positive",
            ));
        }
        if self.report_every == 0 {
            return Err(TrainError::InvalidConfiguration(
                "report interval must be positive",
            ));
        }
        if self.success_threshold.is_nan() {
            return Err(TrainError::InvalidConfiguration(
                "success threshold must be a number",
            ));
        }
        Ok(())
    }
}

/// Lake layout selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MapKind {
    FourByFour,
    EightByEight,
    Random { size: usize, frozen_probability: f64 },
}

/// Settings for the FrozenLake environment the trainer samples from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LakeConfig {
    pub map: MapKind,
    pub slippery: bool,
    /// Defaults to 100 steps for 4x4 maps and 200 otherwise when `None`.
    pub max_episode_steps: Option<usize>,
    pub seed: u64,
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            map: MapKind::FourByFour,
            slippery: true,
            max_episode_steps: None,
            seed: DEFAULT_SEED,
        }
    }
}

impl LakeConfig {
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.max_episode_steps == Some(0) {
            return Err(TrainError::InvalidConfiguration(
                "max episode steps must be positive",
            ));
        }
        if let MapKind::Random {
            size,
            frozen_probability,
        } = self.map
        {
            if size < 2 {
                return Err(TrainError::InvalidConfiguration(
                    "random maps need a size of at least 2",
                ));
            }
            if !(frozen_probability > 0.0 && frozen_probability <= 1.0) {
                return Err(TrainError::InvalidConfiguration(
                    "frozen probability must be in (0, 1]",
                ));
            }
        }
        Ok(())
    }

    pub fn time_limit(&self) -> usize {
        self.max_episode_steps.unwrap_or(match self.map {
            MapKind::FourByFour => 100,
            _ => 200,
        })
    }

    /// Builds the one-hot wrapped lake described by this config.
    pub fn build(&self) -> Result<OneHot<FrozenLake>, EnvError> {
        let map = match self.map {
            MapKind::FourByFour => LakeMap::four_by_four(),
            MapKind::EightByEight => LakeMap::eight_by_eight(),
            MapKind::Random {
                size,
                frozen_probability,
            } => {
                let mut rng = StdRng::seed_from_u64(self.seed ^ MAP_SEED_SALT);
                LakeMap::random(size, frozen_probability, &mut rng)?
            }
        };
        let lake = FrozenLake::builder(map)
            .with_seed(self.seed)
            .slippery(self.slippery)
            .with_time_limit(Some(self.time_limit()))
            .build()?;
        OneHot::new(lake)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;

    #[test]
    fn defaults_are_valid() {
        let config = CrossEntropyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.pool_capacity, 500);
        assert_eq!(config.percentile, 70.0);
        assert!(LakeConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = CrossEntropyConfig::default();
        config.percentile = 120.0;
        assert!(config.validate().is_err());
        let mut config = CrossEntropyConfig::default();
        config.gamma = 0.0;
        assert!(config.validate().is_err());
        let mut config = CrossEntropyConfig::default();
        config.pool_capacity = 10;
        assert!(config.validate().is_err());
        let lake = LakeConfig {
            map: MapKind::Random {
                size: 1,
                frozen_probability: 0.8,
            },
            ..LakeConfig::default()
        };
        assert!(lake.validate().is_err());
    }

    #[test]
    fn sampler_stream_differs_from_lake_stream() {
        use rand::RngCore;

        for seed in [0, 7, DEFAULT_SEED] {
            assert_ne!(sampler_seed(seed), seed);
            let mut lake = StdRng::seed_from_u64(seed);
            let mut sampler = StdRng::seed_from_u64(sampler_seed(seed));
            let lake_draws: Vec<u32> = (0..16).map(|_| lake.next_u32()).collect();
            let sampler_draws: Vec<u32> = (0..16).map(|_| sampler.next_u32()).collect();
            for window in 1..8 {
                assert_ne!(&lake_draws[window..], &sampler_draws[..16 - window]);
                assert_ne!(&sampler_draws[window..], &lake_draws[..16 - window]);
            }
        }
    }

    #[test]
    fn lake_config_builds_one_hot_environment() {
        let config = LakeConfig {
            map: MapKind::EightByEight,
            ..LakeConfig::default()
        };
        assert_eq!(config.time_limit(), 200);
        let env = config.build().expect("env");
        assert_eq!(env.observation_space().flat_dim(), 64);
        assert_eq!(env.action_space().cardinality(), Some(4));
    }
}
