//! # Neural Network Functional Interface (`nn::functional`)
//!
//! Stateless functions for activations and losses, mirroring
//! `torch.nn.functional`. Losses here return the unreduced per-sample
//! values; reduction is applied by the loss modules in [`super::loss`].

use crate::tensor::{ops, Tensor, TensorError};

// --- Activation Functions ---

/// `relu(x) = max(0, x)`
pub fn relu(input: &Tensor) -> Result<Tensor, TensorError> {
    ops::relu(input)
}

/// `sigmoid(x) = 1 / (1 + exp(-x))`
pub fn sigmoid(input: &Tensor) -> Result<Tensor, TensorError> {
    ops::sigmoid(input)
}

pub fn tanh(input: &Tensor) -> Result<Tensor, TensorError> {
    ops::tanh(input)
}

/// Log-softmax over the class axis of an `(N, C)` tensor.
pub fn log_softmax(input: &Tensor) -> Result<Tensor, TensorError> {
    ops::log_softmax(input)
}

// --- Loss Functions ---

/// Element-wise squared error `(input - target)^2`. Shapes must match.
pub fn squared_error(input: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
    if input.shape() != target.shape() {
        return Err(TensorError::ShapeMismatch {
            expected: input.shape().to_vec(),
            got: target.shape().to_vec(),
        });
    }
    let diff = ops::sub(input, target)?;
    ops::mul(&diff, &diff)
}

/// Per-sample negative log likelihood.
///
/// # Arguments
/// * `log_probs`: `(N, C)` log-probabilities.
/// * `target`: `(N)` class indices stored as floats, `0 <= target[i] < C`.
pub fn nll(log_probs: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
    if log_probs.ndim() != 2 {
        return Err(TensorError::RankMismatch {
            op: "nll_loss".to_string(),
            expected: 2,
            got: log_probs.ndim(),
        });
    }
    if target.ndim() != 1 || target.shape()[0] != log_probs.shape()[0] {
        return Err(TensorError::IncompatibleShapes {
            op: "nll_loss".to_string(),
            shape1: log_probs.shape().to_vec(),
            shape2: target.shape().to_vec(),
        });
    }
    let picked = ops::gather_rows(log_probs, target)?;
    ops::mul_scalar(&picked, -1.0)
}

/// Per-sample cross entropy of raw `(N, C)` logits against class indices.
pub fn cross_entropy(logits: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
    nll(&log_softmax(logits)?, target)
}

/// Mean squared error: `mean((input - target)^2)`.
pub fn mse_loss(input: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
    ops::mean(&squared_error(input, target)?)
}

/// Mean negative log likelihood over the batch.
pub fn nll_loss(log_probs: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
    ops::mean(&nll(log_probs, target)?)
}

/// Mean cross-entropy over the batch. Combines log-softmax and NLL.
pub fn cross_entropy_loss(logits: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
    ops::mean(&cross_entropy(logits, target)?)
}
