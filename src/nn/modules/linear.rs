//! # Linear Layer Module

use crate::nn::Module;
use crate::tensor::{ops, uniform, Device, Tensor, TensorData, TensorError};
use std::collections::BTreeMap;

/// Applies a linear transformation to the incoming data: `y = xA^T + b`.
///
/// Input shape: `(N, in_features)`; output shape: `(N, out_features)`.
#[derive(Debug)]
pub struct Linear {
    pub weight: Tensor,       // Shape: (out_features, in_features)
    pub bias: Option<Tensor>, // Shape: (out_features)

    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Creates a new Linear module.
    ///
    /// Weights and bias are drawn from `U(-k, k)` with `k = 1/sqrt(in_features)`,
    /// matching PyTorch's defaults, using the seeded RNG.
    pub fn new(in_features: usize, out_features: usize, bias: bool) -> Self {
        let k = 1.0 / (in_features.max(1) as TensorData).sqrt();
        let weight = uniform(&[out_features, in_features], -k, k, true);
        let bias = bias.then(|| uniform(&[out_features], -k, k, true));

        Linear {
            weight,
            bias,
            in_features,
            out_features,
        }
    }

    /// Builds a layer around existing tensors.
    pub fn from_tensors(weight: Tensor, bias: Option<Tensor>) -> Result<Self, TensorError> {
        if weight.ndim() != 2 {
            return Err(TensorError::RankMismatch {
                op: "Linear::from_tensors".to_string(),
                expected: 2,
                got: weight.ndim(),
            });
        }
        let (out_features, in_features) = (weight.shape()[0], weight.shape()[1]);
        if let Some(ref b) = bias {
            if b.shape() != [out_features].as_slice() {
                return Err(TensorError::ShapeMismatch {
                    expected: vec![out_features],
                    got: b.shape().to_vec(),
                });
            }
        }
        Ok(Linear {
            weight,
            bias,
            in_features,
            out_features,
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }
}

impl Module for Linear {
    /// Performs the forward pass: `input @ weight.T + bias`.
    fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError> {
        let weight_t = ops::transpose(&self.weight, 0, 1)?;
        let output = ops::matmul(input, &weight_t)?;

        match self.bias {
            Some(ref bias) => ops::add(&output, bias),
            None => Ok(output),
        }
    }

    fn parameters(&self) -> BTreeMap<String, Tensor> {
        let mut params = BTreeMap::new();
        params.insert("weight".to_string(), self.weight.clone());
        if let Some(ref bias) = self.bias {
            params.insert("bias".to_string(), bias.clone());
        }
        params
    }

    fn boxed_clone(&self) -> Result<Box<dyn Module>, TensorError> {
        let bias = self.bias.as_ref().map(Tensor::deep_clone).transpose()?;
        Ok(Box::new(Linear {
            weight: self.weight.deep_clone()?,
            bias,
            in_features: self.in_features,
            out_features: self.out_features,
        }))
    }

    fn to_device(&mut self, device: Device) {
        self.weight = self.weight.to(device);
        self.bias = self.bias.as_ref().map(|b| b.to(device));
    }
}
