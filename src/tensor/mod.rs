//! # Tensor Module
//!
//! Defines the core `Tensor` struct used by the models, losses and data
//! loaders in this crate, together with device placement and math ops.
//! There is no autograd here: every tensor is evaluated eagerly, and
//! `requires_grad` is only carried as metadata so that inference paths can
//! `detach()` their inputs explicitly.

use ndarray::{ArrayD, IxDyn};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

// --- Submodules ---
pub mod device;
pub mod ops;

// --- Re-exports ---
pub use device::Device;

// --- Error Handling ---
#[derive(thiserror::Error, Debug)]
pub enum TensorError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Incompatible shapes for operation {op}: {shape1:?} and {shape2:?}")]
    IncompatibleShapes {
        op: String,
        shape1: Vec<usize>,
        shape2: Vec<usize>,
    },
    #[error("Index out of bounds: index {index} for axis of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("Operation {op} requires a tensor with {expected} dimensions, got {got}")]
    RankMismatch {
        op: String,
        expected: usize,
        got: usize,
    },
    #[error("Invalid class index {0}: expected a finite, non-negative whole number")]
    InvalidIndex(TensorData),
    #[error("Cannot operate on an empty tensor: {0}")]
    Empty(String),
    #[error("ndarray error: {0}")]
    NdarrayError(#[from] ndarray::ShapeError),
    #[error("Tensor data lock poisoned")]
    LockPoisoned,
    #[error("Generic error: {0}")]
    Generic(String),
}

/// Element type of every tensor.
pub type TensorData = f32;

/// # Tensor
///
/// A dense n-dimensional array of `f32`. Cloning a `Tensor` is cheap: the
/// data lives behind an `Arc<RwLock<...>>` and is shared between clones.
/// Use [`Tensor::deep_clone`] when an independent copy is needed.
#[derive(Clone, Debug)]
pub struct Tensor {
    data: Arc<RwLock<ArrayD<TensorData>>>,
    shape: Vec<usize>,
    requires_grad: bool,
    device: Device,
}

impl Tensor {
    /// Creates a new Tensor from an ndarray::ArrayD.
    pub fn new(data: ArrayD<TensorData>, requires_grad: bool) -> Self {
        let shape = data.shape().to_vec();
        Tensor {
            data: Arc::new(RwLock::new(data)),
            shape,
            requires_grad,
            device: Device::Cpu,
        }
    }

    /// Builds a tensor from a flat vector and a shape.
    pub fn from_vec(values: Vec<TensorData>, shape: &[usize]) -> Result<Self, TensorError> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)?;
        Ok(Tensor::new(data, false))
    }

    /// Returns the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Read access to the underlying data.
    pub fn data(&self) -> Result<RwLockReadGuard<'_, ArrayD<TensorData>>, TensorError> {
        self.data.read().map_err(|_| TensorError::LockPoisoned)
    }

    /// Write access to the underlying data. The shape must not change.
    pub fn data_mut(&self) -> Result<RwLockWriteGuard<'_, ArrayD<TensorData>>, TensorError> {
        self.data.write().map_err(|_| TensorError::LockPoisoned)
    }

    /// Clones the underlying data into a new ArrayD.
    pub fn data_clone(&self) -> Result<ArrayD<TensorData>, TensorError> {
        Ok(self.data()?.clone())
    }

    /// Flattens the data into a row-major vector.
    pub fn to_vec(&self) -> Result<Vec<TensorData>, TensorError> {
        Ok(self.data()?.iter().copied().collect())
    }

    /// Returns a new tensor sharing the same data but marked as not
    /// requiring gradients.
    pub fn detach(&self) -> Self {
        Tensor {
            data: Arc::clone(&self.data),
            shape: self.shape.clone(),
            requires_grad: false,
            device: self.device,
        }
    }

    /// Copies the data into fresh storage, so that writes to the result are
    /// not visible through `self`.
    pub fn deep_clone(&self) -> Result<Self, TensorError> {
        let mut copy = Tensor::new(self.data_clone()?, self.requires_grad);
        copy.device = self.device;
        Ok(copy)
    }

    /// Moves the tensor to `device`. On the CPU backend this only records
    /// the placement.
    pub fn to(&self, device: Device) -> Self {
        let mut moved = self.clone();
        moved.device = device;
        moved
    }

    /// Overwrites the data with `values`, which must have the same shape.
    pub fn assign(&self, values: &ArrayD<TensorData>) -> Result<(), TensorError> {
        if values.shape() != self.shape() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.clone(),
                got: values.shape().to_vec(),
            });
        }
        self.data_mut()?.assign(values);
        Ok(())
    }

    /// Checks if the tensor represents a single scalar value.
    pub fn is_scalar(&self) -> bool {
        self.size() == 1
    }

    /// Returns the single value of a scalar tensor.
    pub fn item(&self) -> Result<TensorData, TensorError> {
        if !self.is_scalar() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![],
                got: self.shape.clone(),
            });
        }
        self.data()?
            .iter()
            .next()
            .copied()
            .ok_or_else(|| TensorError::Empty("item".to_string()))
    }
}

// --- Helper functions ---

/// Helper to create a tensor filled with zeros.
pub fn zeros(shape: &[usize], requires_grad: bool) -> Tensor {
    Tensor::new(ArrayD::zeros(IxDyn(shape)), requires_grad)
}

/// Helper to create a tensor filled with ones.
pub fn ones(shape: &[usize], requires_grad: bool) -> Tensor {
    Tensor::new(ArrayD::ones(IxDyn(shape)), requires_grad)
}

/// Helper to create a tensor with values drawn uniformly from `[low, high)`
/// using the seeded RNG (see [`crate::utils::random`]).
pub fn uniform(shape: &[usize], low: TensorData, high: TensorData, requires_grad: bool) -> Tensor {
    use rand::distributions::{Distribution, Uniform};

    let range = Uniform::new(low, high);
    let data = crate::utils::random::with_rng(|rng| {
        ArrayD::from_shape_simple_fn(IxDyn(shape), || range.sample(rng))
    });
    Tensor::new(data, requires_grad)
}
