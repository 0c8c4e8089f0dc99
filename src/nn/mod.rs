//! # Neural Network Module (`nn`)
//!
//! The model abstraction the validation and checkpoint utilities operate on:
//! the `Module` trait, a handful of layers, loss functions and a functional
//! interface.

use crate::tensor::{Device, Tensor, TensorError};
use std::collections::BTreeMap;
use std::fmt::Debug;

// --- Submodules ---
pub mod functional;
pub mod loss;
pub mod modules;

pub use loss::{get_loss_func, CrossEntropyLoss, Loss, LossError, LossKind, MSELoss, NLLLoss};
pub use modules::*;

// --- Core Trait: Module ---

/// Base trait for all neural network modules (layers, containers, etc.).
pub trait Module: Debug + Send + Sync + 'static {
    /// Performs the forward pass of the module.
    fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError>;

    /// Returns the module's trainable tensors keyed by name ("weight", "bias", ...).
    /// BTreeMap keeps the order deterministic.
    fn parameters(&self) -> BTreeMap<String, Tensor>;

    /// All tensors that make up the module's state: parameters plus buffers.
    /// Default implementation just returns parameters.
    fn tensors(&self) -> BTreeMap<String, Tensor> {
        self.parameters()
    }

    /// Sets the module and its submodules to training mode.
    /// Default implementation does nothing; modules with mode-dependent behavior override this.
    fn train(&mut self) {}

    /// Sets the module and its submodules to evaluation mode.
    fn eval(&mut self) {}

    fn is_training(&self) -> bool {
        false
    }

    /// Returns an independent copy of the module: parameter data is copied,
    /// not shared.
    fn boxed_clone(&self) -> Result<Box<dyn Module>, TensorError>;

    /// Places the module's tensors on `device`.
    fn to_device(&mut self, _device: Device) {}

    /// Total number of scalar parameters.
    fn num_parameters(&self) -> usize {
        self.parameters().values().map(Tensor::size).sum()
    }
}

/// Runs `forward` on a detached input, so no gradient bookkeeping
/// follows the result.
pub fn forward_no_grad(module: &dyn Module, input: &Tensor) -> Result<Tensor, TensorError> {
    Ok(module.forward(&input.detach())?.detach())
}

// --- Containers ---

/// A sequential container for modules.
/// The forward pass applies each module in order.
#[derive(Debug)]
pub struct Sequential {
    modules: Vec<Box<dyn Module>>,
    is_training: bool,
}

impl Sequential {
    pub fn new() -> Self {
        Sequential {
            modules: Vec::new(),
            is_training: true,
        }
    }

    pub fn from_modules(modules: Vec<Box<dyn Module>>) -> Self {
        Sequential {
            modules,
            is_training: true,
        }
    }

    /// Appends a module; builder style.
    pub fn add(mut self, module: impl Module) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Sequential {
    fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError> {
        self.modules
            .iter()
            .try_fold(input.clone(), |current, module| module.forward(&current))
    }

    fn parameters(&self) -> BTreeMap<String, Tensor> {
        let mut params = BTreeMap::new();
        for (i, module) in self.modules.iter().enumerate() {
            for (name, param) in module.parameters() {
                // Prefix parameter names with module index for uniqueness
                params.insert(format!("{}.{}", i, name), param);
            }
        }
        params
    }

    fn tensors(&self) -> BTreeMap<String, Tensor> {
        let mut tensors = BTreeMap::new();
        for (i, module) in self.modules.iter().enumerate() {
            for (name, tensor) in module.tensors() {
                tensors.insert(format!("{}.{}", i, name), tensor);
            }
        }
        tensors
    }

    fn train(&mut self) {
        self.is_training = true;
        for module in &mut self.modules {
            module.train();
        }
    }

    fn eval(&mut self) {
        self.is_training = false;
        for module in &mut self.modules {
            module.eval();
        }
    }

    fn is_training(&self) -> bool {
        self.is_training
    }

    fn boxed_clone(&self) -> Result<Box<dyn Module>, TensorError> {
        let modules = self
            .modules
            .iter()
            .map(|m| m.boxed_clone())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(Sequential {
            modules,
            is_training: self.is_training,
        }))
    }

    fn to_device(&mut self, device: Device) {
        for module in &mut self.modules {
            module.to_device(device);
        }
    }
}
