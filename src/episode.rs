use crate::error::TrainError;

/// Model input produced by the environment for a single step.
pub type Observation = Vec<f32>;

/// Observation the policy saw together with the action it sampled.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeStep {
    observation: Observation,
    action: usize,
}

impl EpisodeStep {
    pub fn new(observation: Observation, action: usize) -> Self {
        Self {
            observation,
            action,
        }
    }

    pub fn observation(&self) -> &[f32] {
        &self.observation
    }

    pub fn action(&self) -> usize {
        self.action
    }
}

/// Completed rollout: undiscounted total reward and the time-ordered steps.
#[derive(Clone, Debug, PartialEq)]
pub struct Episode {
    reward: f32,
    steps: Vec<EpisodeStep>,
}

impl Episode {
    pub fn new(reward: f32, steps: Vec<EpisodeStep>) -> Result<Self, TrainError> {
        if steps.is_empty() {
            return Err(TrainError::EmptyEpisode);
        }
        Ok(Self { reward, steps })
    }

    pub fn reward(&self) -> f32 {
        self.reward
    }

    pub fn steps(&self) -> &[EpisodeStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Mean undiscounted reward of a batch, `NaN` for an empty batch.
pub fn mean_reward(episodes: &[Episode]) -> f32 {
    if episodes.is_empty() {
        return f32::NAN;
    }
    episodes.iter().map(Episode::reward).sum::<f32>() / episodes.len() as f32
}

/// Sliding window over the most recent episodes.
#[derive(Clone, Debug)]
pub struct EpisodePool {
    capacity: usize,
    episodes: Vec<Episode>,
}

impl EpisodePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            episodes: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    /// Appends `batch` after the existing episodes and drops the oldest ones
    /// beyond the capacity.
    pub fn merge<I>(&mut self, batch: I)
    where
        I: IntoIterator<Item = Episode>,
    {
        self.episodes.extend(batch);
        self.truncate();
    }

    /// Swaps the pool content for `episodes`, keeping at most the last
    /// `capacity` of them.
    pub fn replace(&mut self, episodes: Vec<Episode>) {
        self.episodes = episodes;
        self.truncate();
    }

    pub fn clear(&mut self) {
        self.episodes.clear();
    }

    fn truncate(&mut self) {
        if self.episodes.len() > self.capacity {
            let excess = self.episodes.len() - self.capacity;
            self.episodes.drain(..excess);
        }
    }
}
