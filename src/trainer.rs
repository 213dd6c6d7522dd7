//! Cross-entropy training loop.
//!
//! Each call to [`CrossEntropyTrainer::iterate`] walks the states
//! `SAMPLING -> FILTERING -> (SKIP | UPDATING) -> CHECKPOINTING? ->
//! CONVERGENCE_CHECK` and leaves the loop either ready for the next batch or
//! terminated. Sampling always uses an inner-backend copy of the parameters
//! taken before the batch starts; the optimizer step runs only after the batch
//! is complete.

use std::fmt;
use std::time::{Duration, Instant};

use burn::module::AutodiffModule;
use burn::optim::AdamConfig;
use burn::tensor::backend::AutodiffBackend;
use rand::Rng;
use tracing::{debug, info};

use crate::checkpoint::{CheckpointLabel, CheckpointSink, NoopCheckpoints};
use crate::config::{CrossEntropyConfig, PoolRetention};
use crate::env::Environment;
use crate::episode::{EpisodePool, Observation, mean_reward};
use crate::error::TrainError;
use crate::filter::filter_elite;
use crate::metrics::{LOSS, MetricsSink, NoopMetrics, REWARD_BOUND, REWARD_MEAN};
use crate::ml::{EliteBatch, PolicyNetwork, PolicyTrainer};
use crate::sampler::EpisodeSampler;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoopState {
    Running,
    Terminated { iteration: usize },
}

/// What happened during one iteration.
#[derive(Clone, Debug)]
pub struct IterationReport {
    pub iteration: usize,
    /// `None` when no episode beat the reward bound and the update was skipped.
    pub loss: Option<f32>,
    pub reward_mean: f32,
    pub reward_bound: f32,
    pub elite_episodes: usize,
    pub training_examples: usize,
    pub pool_size: usize,
    pub duration: Duration,
    pub solved: bool,
}

impl IterationReport {
    pub fn skipped(&self) -> bool {
        self.loss.is_none()
    }
}

impl fmt::Display for IterationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: loss=", self.iteration)?;
        match self.loss {
            Some(loss) => write!(f, "{loss:.3}")?,
            None => write!(f, "skipped")?,
        }
        write!(
            f,
            ", reward_mean={:.3}, reward_bound={:.3}, time={:.2}",
            self.reward_mean,
            self.reward_bound,
            self.duration.as_secs_f64()
        )
    }
}

#[derive(Clone, Debug)]
pub struct TrainingSummary {
    pub iterations: usize,
    pub solved: bool,
    pub history: Vec<IterationReport>,
}

pub struct CrossEntropyTrainer<B: AutodiffBackend, E, R> {
    config: CrossEntropyConfig,
    trainer: PolicyTrainer<B>,
    sampler: EpisodeSampler<E, R>,
    pool: EpisodePool,
    observation_size: usize,
    iteration: usize,
    state: LoopState,
    checkpoints: Box<dyn CheckpointSink<B::InnerBackend>>,
    metrics: Box<dyn MetricsSink>,
}

impl<B, E, R> CrossEntropyTrainer<B, E, R>
where
    B: AutodiffBackend,
    E: Environment<Observation = Observation>,
    R: Rng,
{
    pub fn new(config: CrossEntropyConfig, env: E, rng: R) -> Result<Self, TrainError> {
        config.validate()?;
        let observation_size = env.observation_space().flat_dim();
        let sampler = EpisodeSampler::new(env, rng, config.batch_size)?;
        let model = PolicyNetwork::<B>::new(observation_size, config.hidden_size, sampler.n_actions());
        let trainer = PolicyTrainer::with_config(model, AdamConfig::new(), config.learning_rate);
        Ok(Self {
            pool: EpisodePool::new(config.pool_capacity),
            config,
            trainer,
            sampler,
            observation_size,
            iteration: 0,
            state: LoopState::Running,
            checkpoints: Box::new(NoopCheckpoints),
            metrics: Box::new(NoopMetrics),
        })
    }

    pub fn with_checkpoints<C>(mut self, checkpoints: C) -> Self
    where
        C: CheckpointSink<B::InnerBackend> + 'static,
    {
        self.checkpoints = Box::new(checkpoints);
        self
    }

    pub fn with_metrics<M>(mut self, metrics: M) -> Self
    where
        M: MetricsSink + 'static,
    {
        self.metrics = Box::new(metrics);
        self
    }

    pub fn config(&self) -> &CrossEntropyConfig {
        &self.config
    }

    pub fn model(&self) -> &PolicyNetwork<B> {
        self.trainer.model()
    }

    pub fn pool(&self) -> &EpisodePool {
        &self.pool
    }

    pub fn sampler(&self) -> &EpisodeSampler<E, R> {
        &self.sampler
    }

    pub fn observation_size(&self) -> usize {
        self.observation_size
    }

    pub fn n_actions(&self) -> usize {
        self.sampler.n_actions()
    }

    pub fn optimizer_steps(&self) -> usize {
        self.trainer.steps()
    }

    /// Index of the next iteration to run.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, LoopState::Terminated { .. })
    }

    /// Runs one full sample, filter, update, checkpoint and convergence pass.
    ///
    /// Metrics and checkpoint errors are returned after the iteration has
    /// been counted, so calling again continues with the next iteration.
    pub fn iterate(&mut self) -> Result<IterationReport, TrainError> {
        if let LoopState::Terminated { iteration } = self.state {
            return Err(TrainError::Terminated(iteration));
        }
        let started = Instant::now();
        let iteration = self.iteration;

        let snapshot = self.trainer.model().valid();
        let batch = self.sampler.next_batch(&snapshot)?;
        let reward_mean = mean_reward(&batch);

        self.pool.merge(batch);
        let selection = filter_elite(
            self.pool.episodes(),
            self.config.percentile,
            self.config.gamma,
        );
        let reward_bound = selection.reward_bound;
        let elite_episodes = selection.elite.len();
        let training_examples = selection.example_count();

        let loss = if selection.is_empty() {
            debug!(iteration, reward_bound, "no elite episodes, skipping update");
            None
        } else {
            let elite_batch = EliteBatch::<B>::from_selection(&selection, self.sampler.n_actions())?;
            Some(self.trainer.train_step(elite_batch))
        };
        if self.config.retention == PoolRetention::Elite {
            self.pool.replace(selection.elite);
        }
        let solved = reward_mean > self.config.success_threshold;
        // Parameters and pool have moved on; a sink failure below must not
        // make a retry replay this iteration.
        self.iteration += 1;
        if solved {
            self.state = LoopState::Terminated { iteration };
        }

        if let Some(loss) = loss {
            self.metrics.record(LOSS, loss, iteration)?;
        }
        self.metrics.record(REWARD_BOUND, reward_bound, iteration)?;
        self.metrics.record(REWARD_MEAN, reward_mean, iteration)?;

        if iteration % self.config.checkpoint_every == 0 {
            self.checkpoints
                .save(CheckpointLabel::Iteration(iteration), &self.trainer.model().valid())?;
        }

        if solved {
            info!(iteration, reward_mean, "success threshold reached");
            self.checkpoints
                .save(CheckpointLabel::Final(iteration), &self.trainer.model().valid())?;
            self.metrics.flush()?;
        }

        Ok(IterationReport {
            iteration,
            loss,
            reward_mean,
            reward_bound,
            elite_episodes,
            training_examples,
            pool_size: self.pool.len(),
            duration: started.elapsed(),
            solved,
        })
    }

    /// Iterates until the success threshold is reached or `on_iteration`
    /// returns `false`.
    pub fn run<F>(&mut self, mut on_iteration: F) -> Result<TrainingSummary, TrainError>
    where
        F: FnMut(&IterationReport) -> bool,
    {
        let mut history = Vec::new();
        while !self.is_terminated() {
            let report = self.iterate()?;
            let keep_going = on_iteration(&report);
            history.push(report);
            if !keep_going {
                debug!(iteration = self.iteration, "training interrupted by caller");
                break;
            }
        }
        self.metrics.flush()?;
        Ok(TrainingSummary {
            iterations: history.len(),
            solved: self.is_terminated(),
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LakeConfig;
    use crate::env::{FrozenLake, OneHot, Space, StepInfo, Transition};
    use crate::error::EnvError;
    use crate::sampler::StochasticPolicy;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    type Backend = Autodiff<NdArray<f32>>;

    /// Action 1 ends the episode at once, action 0 one step later; both pay 1.
    #[derive(Clone, Default)]
    struct Corridor {
        position: usize,
    }

    impl Environment for Corridor {
        type Observation = Vec<f32>;

        fn observation_space(&self) -> Space {
            Space::Box {
                len: 2,
                low: 0.0,
                high: 1.0,
            }
        }

        fn action_space(&self) -> Space {
            Space::Discrete { n: 2 }
        }

        fn reset(&mut self) -> Vec<f32> {
            self.position = 0;
            vec![1.0, 0.0]
        }

        fn step(&mut self, action: usize) -> Result<Transition<Vec<f32>>, EnvError> {
            let done = action == 1 || self.position == 1;
            self.position = 1;
            Ok(Transition {
                observation: vec![0.0, 1.0],
                reward: if done { 1.0 } else { 0.0 },
                done,
                info: StepInfo::default(),
            })
        }
    }

    fn small_trainer(
        retention: PoolRetention,
    ) -> CrossEntropyTrainer<Backend, OneHot<FrozenLake>, StdRng> {
        let config = CrossEntropyConfig {
            hidden_size: 16,
            batch_size: 8,
            pool_capacity: 20,
            retention,
            ..CrossEntropyConfig::default()
        };
        let env = LakeConfig::default().build().expect("env");
        CrossEntropyTrainer::new(config, env, StdRng::seed_from_u64(21)).expect("trainer")
    }

    #[test]
    fn report_line_matches_console_format() {
        let report = IterationReport {
            iteration: 7,
            loss: Some(1.23456),
            reward_mean: 0.1,
            reward_bound: 0.05,
            elite_episodes: 3,
            training_examples: 12,
            pool_size: 3,
            duration: Duration::from_millis(250),
            solved: false,
        };
        assert_eq!(
            report.to_string(),
            "7: loss=1.235, reward_mean=0.100, reward_bound=0.050, time=0.25"
        );
        let skipped = IterationReport {
            loss: None,
            ..report
        };
        assert!(skipped.to_string().starts_with("7: loss=skipped,"));
    }

    #[test]
    fn elite_retention_keeps_only_elites() {
        let mut trainer = small_trainer(PoolRetention::Elite);
        for _ in 0..3 {
            let report = trainer.iterate().expect("iteration");
            assert_eq!(report.pool_size, report.elite_episodes);
            assert!(report.pool_size <= 20);
            assert_eq!(report.skipped(), report.elite_episodes == 0);
        }
        assert_eq!(trainer.iteration(), 3);
    }

    #[test]
    fn all_retention_fills_pool_to_capacity() {
        let mut trainer = small_trainer(PoolRetention::All);
        let sizes: Vec<usize> = (0..4)
            .map(|_| trainer.iterate().expect("iteration").pool_size)
            .collect();
        assert_eq!(sizes, vec![8, 16, 20, 20]);
    }

    #[test]
    fn batches_use_parameters_from_before_the_update() {
        let config = CrossEntropyConfig {
            hidden_size: 8,
            batch_size: 16,
            pool_capacity: 100,
            percentile: 10.0,
            success_threshold: 2.0,
            retention: PoolRetention::All,
            ..CrossEntropyConfig::default()
        };
        let mut trainer =
            CrossEntropyTrainer::<Backend, _, _>::new(config, Corridor::default(), StdRng::seed_from_u64(5))
                .expect("trainer");
        for _ in 0..3 {
            let before = trainer.model().valid();
            let mut replay = trainer.sampler.clone();
            let expected = replay.next_batch(&before).expect("batch");
            let steps_before = trainer.optimizer_steps();

            let report = trainer.iterate().expect("iteration");
            let episodes = trainer.pool().episodes();
            assert_eq!(&episodes[episodes.len() - 16..], expected.as_slice());
            assert_eq!(
                trainer.optimizer_steps(),
                steps_before + usize::from(!report.skipped())
            );
            if !report.skipped() {
                let after = trainer.model().valid();
                let observation = [1.0, 0.0];
                assert_ne!(
                    before.action_probabilities(&observation).expect("before"),
                    after.action_probabilities(&observation).expect("after")
                );
            }
        }
        assert!(trainer.optimizer_steps() > 0);
    }

    #[test]
    fn run_stops_when_callback_declines() {
        let mut trainer = small_trainer(PoolRetention::Elite);
        let summary = trainer.run(|report| report.iteration < 1).expect("run");
        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.history.len(), 2);
        assert!(!trainer.is_terminated() || summary.solved);
    }
}
