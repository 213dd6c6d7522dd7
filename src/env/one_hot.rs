use super::{Environment, Space, Transition};
use crate::error::EnvError;

/// Presents a discrete observation space as one-hot `f32` vectors.
pub struct OneHot<E> {
    inner: E,
    size: usize,
}

impl<E> OneHot<E>
where
    E: Environment<Observation = usize>,
{
    pub fn new(inner: E) -> Result<Self, EnvError> {
        let size = inner
            .observation_space()
            .cardinality()
            .ok_or(EnvError::UnsupportedSpace(
                "one-hot encoding requires a discrete observation space",
            ))?;
        Ok(Self { inner, size })
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    pub fn encode(&self, state: usize) -> Vec<f32> {
        let mut encoded = vec![0.0; self.size];
        encoded[state] = 1.0;
        encoded
    }
}

impl<E> Environment for OneHot<E>
where
    E: Environment<Observation = usize>,
{
    type Observation = Vec<f32>;

    fn observation_space(&self) -> Space {
        Space::Box {
            len: self.size,
            low: 0.0,
            high: 1.0,
        }
    }

    fn action_space(&self) -> Space {
        self.inner.action_space()
    }

    fn reset(&mut self) -> Vec<f32> {
        let state = self.inner.reset();
        self.encode(state)
    }

    fn step(&mut self, action: usize) -> Result<Transition<Vec<f32>>, EnvError> {
        let transition = self.inner.step(action)?;
        Ok(Transition {
            observation: self.encode(transition.observation),
            reward: transition.reward,
            done: transition.done,
            info: transition.info,
        })
    }
}
