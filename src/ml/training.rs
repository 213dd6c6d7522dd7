use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, LearningRate, Optimizer};
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Tensor, TensorData};

use super::policy::PolicyNetwork;
use crate::error::TrainError;
use crate::filter::EliteSelection;

/// Elite observations and one-hot action targets as tensors.
#[derive(Debug)]
pub struct EliteBatch<B: Backend> {
    pub observations: Tensor<B, 2>,
    pub targets: Tensor<B, 2>,
}

impl<B: Backend> EliteBatch<B> {
    pub fn new(observations: Tensor<B, 2>, targets: Tensor<B, 2>) -> Self {
        Self {
            observations,
            targets,
        }
    }

    pub fn from_examples(
        observations: &[Vec<f32>],
        actions: &[usize],
        n_actions: usize,
    ) -> Result<Self, TrainError> {
        if observations.is_empty() || actions.is_empty() {
            return Err(TrainError::EmptyTrainingSet);
        }
        if observations.len() != actions.len() {
            return Err(TrainError::InvalidConfiguration(
                "observation and action counts differ",
            ));
        }
        let rows = observations.len();
        let width = observations[0].len();
        let mut flat = Vec::with_capacity(rows * width);
        for observation in observations {
            if observation.len() != width {
                return Err(TrainError::InvalidConfiguration(
                    "observations must share one length",
                ));
            }
            flat.extend_from_slice(observation);
        }
        let mut targets = vec![0.0f32; rows * n_actions];
        for (row, &action) in actions.iter().enumerate() {
            if action >= n_actions {
                return Err(TrainError::InvalidConfiguration(
                    "recorded action outside the action space",
                ));
            }
            targets[row * n_actions + action] = 1.0;
        }
        let device = B::Device::default();
        let observations = Tensor::<B, 2>::from_data(TensorData::new(flat, [rows, width]), &device);
        let targets =
            Tensor::<B, 2>::from_data(TensorData::new(targets, [rows, n_actions]), &device);
        Ok(Self::new(observations, targets))
    }

    pub fn from_selection(selection: &EliteSelection, n_actions: usize) -> Result<Self, TrainError> {
        Self::from_examples(&selection.observations, &selection.actions, n_actions)
    }

    pub fn example_count(&self) -> usize {
        self.observations.shape().dims[0]
    }
}

/// Owns the policy parameters and the Adam state; the only place they change.
pub struct PolicyTrainer<B: AutodiffBackend> {
    model: PolicyNetwork<B>,
    optimizer: OptimizerAdaptor<Adam, PolicyNetwork<B>, B>,
    learning_rate: LearningRate,
    step: usize,
}

impl<B: AutodiffBackend> PolicyTrainer<B> {
    pub fn new(
        model: PolicyNetwork<B>,
        optimizer: OptimizerAdaptor<Adam, PolicyNetwork<B>, B>,
        learning_rate: LearningRate,
    ) -> Self {
        Self {
            model,
            optimizer,
            learning_rate,
            step: 0,
        }
    }

    pub fn with_config(
        model: PolicyNetwork<B>,
        config: AdamConfig,
        learning_rate: LearningRate,
    ) -> Self {
        let optimizer = config.init();
        Self::new(model, optimizer, learning_rate)
    }

    pub fn model(&self) -> &PolicyNetwork<B> {
        &self.model
    }

    pub fn steps(&self) -> usize {
        self.step
    }

    /// One optimizer step on the classification loss; returns the loss before
    /// the update.
    pub fn train_step(&mut self, batch: EliteBatch<B>) -> f32 {
        let loss = Self::cross_entropy(&self.model, &batch);
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        let model = self.model.clone();
        self.model = self.optimizer.step(self.learning_rate, model, grads);
        self.step += 1;
        Self::tensor_to_f32(loss)
    }

    /// Loss of the current parameters without updating them.
    pub fn evaluate(&self, batch: &EliteBatch<B>) -> f32 {
        Self::tensor_to_f32(Self::cross_entropy(&self.model, batch))
    }

    fn cross_entropy(model: &PolicyNetwork<B>, batch: &EliteBatch<B>) -> Tensor<B, 1> {
        let logits = model.forward(batch.observations.clone());
        let log_probs = log_softmax(logits, 1);
        -(batch.targets.clone() * log_probs).sum_dim(1).mean()
    }

    fn tensor_to_f32(tensor: Tensor<B, 1>) -> f32 {
        tensor
            .detach()
            .into_data()
            .to_vec::<f32>()
            .map(|mut values| values.pop().unwrap_or_default())
            .unwrap_or(f32::NAN)
    }
}
