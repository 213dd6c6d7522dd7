//! On-policy episode sampling.
//!
//! [`EpisodeSampler`] keeps the environment, the current observation and the
//! partially built episode between calls, so consecutive batches continue the
//! same stream of rollouts.

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::env::Environment;
use crate::episode::{Episode, EpisodeStep, Observation};
use crate::error::{EnvError, TrainError};

/// Anything that can turn an observation into a distribution over actions.
pub trait StochasticPolicy {
    fn action_probabilities(&self, observation: &[f32]) -> Result<Vec<f32>, TrainError>;
}

/// Picks every action with the same probability.
#[derive(Clone, Copy, Debug)]
pub struct UniformPolicy {
    n_actions: usize,
}

impl UniformPolicy {
    pub fn new(n_actions: usize) -> Self {
        Self { n_actions }
    }
}

impl StochasticPolicy for UniformPolicy {
    fn action_probabilities(&self, _observation: &[f32]) -> Result<Vec<f32>, TrainError> {
        Ok(vec![1.0 / self.n_actions as f32; self.n_actions])
    }
}

/// Rolls out episodes and groups them into fixed-size batches.
#[derive(Clone)]
pub struct EpisodeSampler<E, R> {
    env: E,
    rng: R,
    batch_size: usize,
    n_actions: usize,
    observation: Option<Observation>,
    episode_reward: f32,
    episode_steps: Vec<EpisodeStep>,
    episodes_completed: usize,
    steps_taken: usize,
}

impl<E, R> EpisodeSampler<E, R>
where
    E: Environment<Observation = Observation>,
    R: Rng,
{
    pub fn new(env: E, rng: R, batch_size: usize) -> Result<Self, TrainError> {
        if batch_size == 0 {
            return Err(TrainError::InvalidConfiguration("batch size must be positive"));
        }
        let n_actions = env
            .action_space()
            .cardinality()
            .ok_or(EnvError::UnsupportedSpace("sampling requires a discrete action space"))?;
        if n_actions == 0 {
            return Err(EnvError::UnsupportedSpace("action space is empty").into());
        }
        Ok(Self {
            env,
            rng,
            batch_size,
            n_actions,
            observation: None,
            episode_reward: 0.0,
            episode_steps: Vec::new(),
            episodes_completed: 0,
            steps_taken: 0,
        })
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    pub fn episodes_completed(&self) -> usize {
        self.episodes_completed
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    /// Runs the environment under `policy` until `batch_size` episodes have
    /// finished. Does not return while the current episode never terminates.
    pub fn next_batch<P>(&mut self, policy: &P) -> Result<Vec<Episode>, TrainError>
    where
        P: StochasticPolicy + ?Sized,
    {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            if let Some(episode) = self.advance(policy)? {
                batch.push(episode);
            }
        }
        Ok(batch)
    }

    /// Lazily yields batches under a fixed `policy`.
    pub fn iter<'a, P>(&'a mut self, policy: &'a P) -> Batches<'a, E, R, P>
    where
        P: StochasticPolicy + ?Sized,
    {
        Batches {
            sampler: self,
            policy,
        }
    }

    /// Takes one environment step; returns the episode it completed, if any.
    fn advance<P>(&mut self, policy: &P) -> Result<Option<Episode>, TrainError>
    where
        P: StochasticPolicy + ?Sized,
    {
        let observation = match self.observation.take() {
            Some(observation) => observation,
            None => self.env.reset(),
        };
        let action = match self.sample_action(policy, &observation) {
            Ok(action) => action,
            Err(err) => {
                self.observation = Some(observation);
                return Err(err);
            }
        };
        let transition = match self.env.step(action) {
            Ok(transition) => transition,
            Err(err) => {
                self.observation = Some(observation);
                return Err(err.into());
            }
        };
        self.steps_taken += 1;
        self.episode_reward += transition.reward;
        self.episode_steps.push(EpisodeStep::new(observation, action));

        if transition.done {
            let steps = std::mem::take(&mut self.episode_steps);
            let episode = Episode::new(self.episode_reward, steps)?;
            self.episode_reward = 0.0;
            self.episodes_completed += 1;
            self.observation = Some(self.env.reset());
            Ok(Some(episode))
        } else {
            self.observation = Some(transition.observation);
            Ok(None)
        }
    }

    fn sample_action<P>(&mut self, policy: &P, observation: &[f32]) -> Result<usize, TrainError>
    where
        P: StochasticPolicy + ?Sized,
    {
        let probabilities = policy.action_probabilities(observation)?;
        if probabilities.len() != self.n_actions {
            return Err(TrainError::InvalidDistribution(format!(
                "expected {} probabilities, got {}",
                self.n_actions,
                probabilities.len()
            )));
        }
        let distribution = WeightedIndex::new(&probabilities)
            .map_err(|err| TrainError::InvalidDistribution(err.to_string()))?;
        Ok(distribution.sample(&mut self.rng))
    }
}

/// Infinite iterator over batches, see [`EpisodeSampler::iter`].
pub struct Batches<'a, E, R, P: ?Sized> {
    sampler: &'a mut EpisodeSampler<E, R>,
    policy: &'a P,
}

impl<E, R, P> Iterator for Batches<'_, E, R, P>
where
    E: Environment<Observation = Observation>,
    R: Rng,
    P: StochasticPolicy + ?Sized,
{
    type Item = Result<Vec<Episode>, TrainError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.sampler.next_batch(self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{FrozenLake, LakeMap, OneHot};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct Fixed(Vec<f32>);

    impl StochasticPolicy for Fixed {
        fn action_probabilities(&self, _observation: &[f32]) -> Result<Vec<f32>, TrainError> {
            Ok(self.0.clone())
        }
    }

    fn sampler(seed: u64, batch_size: usize) -> EpisodeSampler<OneHot<FrozenLake>, StdRng> {
        let lake = FrozenLake::builder(LakeMap::four_by_four())
            .with_seed(seed)
            .with_time_limit(Some(100))
            .build()
            .expect("lake");
        let env = OneHot::new(lake).expect("wrapper");
        let rng = StdRng::seed_from_u64(crate::config::sampler_seed(seed));
        EpisodeSampler::new(env, rng, batch_size).expect("sampler")
    }

    #[test]
    fn batches_have_configured_size() {
        let mut sampler = sampler(11, 5);
        let policy = UniformPolicy::new(4);
        let batch = sampler.next_batch(&policy).expect("batch");
        assert_eq!(batch.len(), 5);
        assert!(batch.iter().all(|episode| !episode.is_empty()));
        assert_eq!(sampler.episodes_completed(), 5);
        let total_steps: usize = batch.iter().map(Episode::len).sum();
        assert_eq!(sampler.steps_taken(), total_steps);
    }

    #[test]
    fn deterministic_policy_always_picks_its_action() {
        let mut sampler = sampler(5, 3);
        let batch = sampler
            .next_batch(&Fixed(vec![0.0, 0.0, 1.0, 0.0]))
            .expect("batch");
        for episode in &batch {
            assert!(episode.steps().iter().all(|step| step.action() == 2));
        }
    }

    #[test]
    fn invalid_distributions_are_reported() {
        let mut sampler = sampler(1, 1);
        let zero = sampler.next_batch(&Fixed(vec![0.0; 4]));
        assert!(matches!(zero, Err(TrainError::InvalidDistribution(_))));
        let short = sampler.next_batch(&Fixed(vec![1.0; 3]));
        assert!(matches!(short, Err(TrainError::InvalidDistribution(_))));
    }

    #[test]
    fn iterator_yields_consecutive_batches() {
        let mut sampler = sampler(9, 2);
        let policy = UniformPolicy::new(4);
        let batches: Vec<Vec<Episode>> = sampler
            .iter(&policy)
            .take(3)
            .collect::<Result<_, _>>()
            .expect("batches");
        assert_eq!(batches.len(), 3);
        assert_eq!(sampler.episodes_completed(), 6);
    }

    /// Three-step episodes paying 1 per step; one chosen `step` call fails.
    struct Flaky {
        position: usize,
        calls: usize,
        fail_on: usize,
    }

    impl Environment for Flaky {
        type Observation = Vec<f32>;

        fn observation_space(&self) -> crate::env::Space {
            crate::env::Space::Box {
                len: 1,
                low: 0.0,
                high: 3.0,
            }
        }

        fn action_space(&self) -> crate::env::Space {
            crate::env::Space::Discrete { n: 2 }
        }

        fn reset(&mut self) -> Vec<f32> {
            self.position = 0;
            vec![0.0]
        }

        fn step(
            &mut self,
            _action: usize,
        ) -> Result<crate::env::Transition<Vec<f32>>, EnvError> {
            self.calls += 1;
            if self.calls == self.fail_on {
                return Err(EnvError::EpisodeFinished);
            }
            self.position += 1;
            Ok(crate::env::Transition {
                observation: vec![self.position as f32],
                reward: 1.0,
                done: self.position == 3,
                info: crate::env::StepInfo::default(),
            })
        }
    }

    #[test]
    fn failed_step_resumes_the_same_episode() {
        let env = Flaky {
            position: 0,
            calls: 0,
            fail_on: 2,
        };
        let mut sampler = EpisodeSampler::new(env, StdRng::seed_from_u64(4), 1).expect("sampler");
        let policy = UniformPolicy::new(2);
        let failed = sampler.next_batch(&policy);
        assert!(matches!(failed, Err(TrainError::Env(EnvError::EpisodeFinished))));
        assert_eq!(sampler.steps_taken(), 1);

        let batch = sampler.next_batch(&policy).expect("batch");
        let episode = &batch[0];
        assert_eq!(episode.len(), 3);
        assert_eq!(episode.reward(), 3.0);
        let observations: Vec<f32> = episode
            .steps()
            .iter()
            .map(|step| step.observation()[0])
            .collect();
        assert_eq!(observations, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let lake = FrozenLake::builder(LakeMap::four_by_four())
            .build()
            .expect("lake");
        let env = OneHot::new(lake).expect("wrapper");
        let result = EpisodeSampler::new(env, StdRng::seed_from_u64(0), 0);
        assert!(matches!(result, Err(TrainError::InvalidConfiguration(_))));
    }
}
