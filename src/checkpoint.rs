use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::CrossEntropyConfig;
use crate::error::TrainError;
use crate::ml::PolicyNetwork;

/// Name under which a parameter snapshot is stored.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CheckpointLabel {
    Iteration(usize),
    Final(usize),
}

impl fmt::Display for CheckpointLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointLabel::Iteration(iteration) => write!(f, "{iteration}"),
            CheckpointLabel::Final(iteration) => write!(f, "{iteration}_final"),
        }
    }
}

/// Receives parameter snapshots from the training loop.
pub trait CheckpointSink<B: Backend> {
    fn save(&mut self, label: CheckpointLabel, model: &PolicyNetwork<B>) -> Result<(), TrainError>;
}

/// Discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCheckpoints;

impl<B: Backend> CheckpointSink<B> for NoopCheckpoints {
    fn save(&mut self, _label: CheckpointLabel, _model: &PolicyNetwork<B>) -> Result<(), TrainError> {
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub label: CheckpointLabel,
    pub observation_size: usize,
    pub n_actions: usize,
    pub config: CrossEntropyConfig,
}

#[derive(Serialize, Deserialize)]
pub struct PolicyCheckpoint {
    pub metadata: CheckpointMetadata,
    pub weights: Vec<u8>,
}

/// Writes `<dir>/<label>.model` files holding bincode-encoded checkpoints.
pub struct FileCheckpointer {
    directory: PathBuf,
    observation_size: usize,
    n_actions: usize,
    config: CrossEntropyConfig,
}

impl FileCheckpointer {
    pub fn new(
        directory: impl Into<PathBuf>,
        observation_size: usize,
        n_actions: usize,
        config: CrossEntropyConfig,
    ) -> Result<Self, TrainError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            observation_size,
            n_actions,
            config,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, label: CheckpointLabel) -> PathBuf {
        self.directory.join(format!("{label}.model"))
    }
}

impl<B: Backend> CheckpointSink<B> for FileCheckpointer {
    fn save(&mut self, label: CheckpointLabel, model: &PolicyNetwork<B>) -> Result<(), TrainError> {
        let record = model.clone().into_record();
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::new();
        let weights = <BinBytesRecorder<FullPrecisionSettings> as Recorder<B>>::record(
            &recorder,
            record,
            (),
        )?;
        let checkpoint = PolicyCheckpoint {
            metadata: CheckpointMetadata {
                label,
                observation_size: self.observation_size,
                n_actions: self.n_actions,
                config: self.config.clone(),
            },
            weights,
        };
        let bytes = bincode::serde::encode_to_vec(&checkpoint, bincode::config::standard())?;
        let path = self.path_for(label);
        fs::write(&path, bytes)?;
        info!(path = %path.display(), %label, "checkpoint saved");
        Ok(())
    }
}
