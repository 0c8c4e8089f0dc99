//! # Datasets and Data Loaders
//!
//! A `Dataset` hands out `(input, target)` samples by index; a
//! `DataLoader` groups them into batches, optionally shuffling and
//! gathering samples on a worker pool.

use crate::config::{DataMode, FedConfig};
use crate::tensor::{Tensor, TensorData, TensorError};
use crate::utils::random::with_rng;
use ndarray::{ArrayD, ArrayViewD, Axis};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

pub mod loader;

pub use loader::{Batches, DataLoader};

#[derive(thiserror::Error, Debug)]
pub enum DataError {
    #[error("Sample index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Inputs have {inputs} samples but targets have {targets}")]
    LengthMismatch { inputs: usize, targets: usize },
    #[error("Batch size must be positive")]
    ZeroBatchSize,
    #[error("Data loader yielded no batches")]
    Empty,
    #[error("Samples in a batch have different shapes: {0}")]
    Collate(#[from] ndarray::ShapeError),
    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),
    #[error("Could not start data loader workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// One `(input, target)` pair.
pub type Sample = (ArrayD<TensorData>, ArrayD<TensorData>);

/// Indexed collection of samples.
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Result<Sample, DataError>;
}

/// Dataset over two arrays whose first axis indexes samples.
#[derive(Debug, Clone)]
pub struct TensorDataset {
    inputs: ArrayD<TensorData>,
    targets: ArrayD<TensorData>,
}

impl TensorDataset {
    pub fn new(inputs: ArrayD<TensorData>, targets: ArrayD<TensorData>) -> Result<Self, DataError> {
        let n_inputs = inputs.shape().first().copied().unwrap_or(0);
        let n_targets = targets.shape().first().copied().unwrap_or(0);
        if inputs.ndim() == 0 || targets.ndim() == 0 || n_inputs != n_targets {
            return Err(DataError::LengthMismatch {
                inputs: n_inputs,
                targets: n_targets,
            });
        }
        Ok(TensorDataset { inputs, targets })
    }

    pub fn from_tensors(inputs: &Tensor, targets: &Tensor) -> Result<Self, DataError> {
        Self::new(inputs.data_clone()?, targets.data_clone()?)
    }
}

impl Dataset for TensorDataset {
    fn len(&self) -> usize {
        self.inputs.shape()[0]
    }

    fn get(&self, index: usize) -> Result<Sample, DataError> {
        if index >= self.len() {
            return Err(DataError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok((
            self.inputs.index_axis(Axis(0), index).to_owned(),
            self.targets.index_axis(Axis(0), index).to_owned(),
        ))
    }
}

impl fmt::Debug for dyn Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset").field("len", &self.len()).finish()
    }
}

/// Stacks samples along a new leading axis.
pub(crate) fn collate(samples: &[Sample]) -> Result<(Tensor, Tensor), DataError> {
    let inputs: Vec<ArrayViewD<'_, TensorData>> = samples.iter().map(|(x, _)| x.view()).collect();
    let targets: Vec<ArrayViewD<'_, TensorData>> = samples.iter().map(|(_, y)| y.view()).collect();
    Ok((
        Tensor::new(ndarray::stack(Axis(0), &inputs)?, false),
        Tensor::new(ndarray::stack(Axis(0), &targets)?, false),
    ))
}

/// Fetches `indices` from the dataset, in parallel when a pool is given.
pub(crate) fn fetch(
    dataset: &dyn Dataset,
    indices: &[usize],
    pool: Option<&rayon::ThreadPool>,
) -> Result<Vec<Sample>, DataError> {
    match pool {
        Some(pool) => pool.install(|| indices.par_iter().map(|&i| dataset.get(i)).collect()),
        None => indices.iter().map(|&i| dataset.get(i)).collect(),
    }
}

/// Sample order for one pass over `len` samples.
pub(crate) fn epoch_order(len: usize, shuffle: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    if shuffle {
        with_rng(|rng| order.shuffle(rng));
    }
    order
}

/// Builds the loader for `mode` from the configuration. Absent or empty
/// datasets give `None`.
pub fn get_dataloader(
    cfg: &FedConfig,
    dataset: Option<Arc<dyn Dataset>>,
    mode: DataMode,
) -> Result<Option<DataLoader>, DataError> {
    let Some(dataset) = dataset else {
        return Ok(None);
    };
    if dataset.is_empty() {
        tracing::debug!(%mode, "empty dataset; no data loader");
        return Ok(None);
    }

    let (batch_size, shuffle) = match mode {
        DataMode::Train => (cfg.train_data_batch_size, cfg.train_data_shuffle),
        DataMode::Val | DataMode::Test => (cfg.test_data_batch_size, cfg.test_data_shuffle),
    };
    DataLoader::new(dataset, batch_size, shuffle, cfg.num_workers).map(Some)
}
