//! # Dropout Layer Module

use crate::nn::Module;
use crate::tensor::{ops, Tensor, TensorData, TensorError};
use crate::utils::random::with_rng;
use ndarray::{ArrayD, IxDyn};
use rand::Rng;
use std::collections::BTreeMap;

/// During training, randomly zeroes some elements of the input tensor with probability `p`.
/// The remaining elements are scaled up by `1 / (1 - p)`.
/// During evaluation, this layer does nothing and acts as an identity function.
#[derive(Debug, Clone)]
pub struct Dropout {
    p: f64,
    is_training: bool,
}

impl Dropout {
    /// Creates a new Dropout module.
    /// # Arguments
    /// * `p`: Probability of an element to be zeroed.
    pub fn new(p: f64) -> Result<Self, TensorError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(TensorError::Generic(
                "Dropout probability must be between 0 and 1".to_string(),
            ));
        }
        Ok(Dropout {
            p,
            is_training: true,
        })
    }

    pub fn p(&self) -> f64 {
        self.p
    }
}

impl Module for Dropout {
    fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError> {
        if !self.is_training || self.p == 0.0 {
            return Ok(input.clone());
        }
        if self.p == 1.0 {
            return ops::mul_scalar(input, 0.0);
        }

        let scale = (1.0 / (1.0 - self.p)) as TensorData;
        let mask_data = with_rng(|rng| {
            ArrayD::from_shape_simple_fn(IxDyn(input.shape()), || {
                if rng.gen_bool(self.p) {
                    0.0
                } else {
                    scale
                }
            })
        });
        ops::mul(input, &Tensor::new(mask_data, false))
    }

    /// Dropout has no parameters.
    fn parameters(&self) -> BTreeMap<String, Tensor> {
        BTreeMap::new()
    }

    fn train(&mut self) {
        self.is_training = true;
    }

    fn eval(&mut self) {
        self.is_training = false;
    }

    fn is_training(&self) -> bool {
        self.is_training
    }

    fn boxed_clone(&self) -> Result<Box<dyn Module>, TensorError> {
        Ok(Box::new(self.clone()))
    }
}
