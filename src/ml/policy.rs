use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::{relu, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::error::TrainError;
use crate::sampler::StochasticPolicy;

pub const DEFAULT_HIDDEN: usize = 128;

/// Two linear layers with a ReLU in between, producing action logits.
#[derive(Module, Debug)]
pub struct PolicyNetwork<B: Backend> {
    hidden: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> PolicyNetwork<B> {
    pub fn new(observation_size: usize, hidden: usize, n_actions: usize) -> Self {
        assert!(observation_size > 0, "observation size must be positive");
        assert!(hidden > 0, "hidden width must be positive");
        assert!(n_actions > 0, "action count must be positive");
        let device = B::Device::default();
        Self {
            hidden: LinearConfig::new(observation_size, hidden).init(&device),
            output: LinearConfig::new(hidden, n_actions).init(&device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let activations = relu(self.hidden.forward(input));
        self.output.forward(activations)
    }

    /// Logits for a single observation, shaped `[1, n_actions]`.
    pub fn forward_observation(&self, observation: &[f32]) -> Tensor<B, 2> {
        let input = Tensor::<B, 2>::from_data(
            TensorData::new(observation.to_vec(), [1, observation.len()]),
            &B::Device::default(),
        );
        self.forward(input)
    }
}

impl<B: Backend> StochasticPolicy for PolicyNetwork<B> {
    fn action_probabilities(&self, observation: &[f32]) -> Result<Vec<f32>, TrainError> {
        let probabilities = softmax(self.forward_observation(observation), 1);
        probabilities
            .into_data()
            .to_vec::<f32>()
            .map_err(|err| TrainError::Tensor(format!("{err:?}")))
    }
}
