//! # Loss Functions
//!
//! Loss functions take a prediction and a target, so they get their own
//! `Loss` trait instead of squeezing into `Module::forward`. The structs
//! here hold configuration (reduction) and delegate the math to
//! [`crate::nn::functional`].

use crate::config::FedConfig;
use crate::nn::functional as F;
use crate::tensor::{ops, Tensor, TensorError};
use crate::utils::registry::{Registry, RegistryError};
use std::fmt::Debug;
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum LossError {
    #[error("Unknown loss '{0}'; expected \"CrossEntropy\", \"MSE\" or \"\" for a registered loss")]
    Unknown(String),
    #[error("Could not resolve custom loss: {0}")]
    Registry(#[from] RegistryError),
}

/// Specifies the reduction to apply to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// The loss is returned per element/batch item.
    None,
    /// The sum of the output will be divided by the number of elements.
    #[default]
    Mean,
    Sum,
}

impl Reduction {
    fn apply(self, losses: Tensor) -> Result<Tensor, TensorError> {
        match self {
            Reduction::None => Ok(losses),
            Reduction::Mean => ops::mean(&losses),
            Reduction::Sum => ops::sum(&losses),
        }
    }
}

/// A criterion comparing predictions with targets.
pub trait Loss: Debug + Send + Sync {
    fn compute(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor, TensorError>;

    fn name(&self) -> &'static str;
}

/// Constructor stored in a [`LossRegistry`].
pub type LossFactory = fn() -> Box<dyn Loss>;

pub type LossRegistry = Registry<LossFactory>;

// --- Mean Squared Error Loss ---

/// Mean squared error between each element of the prediction and target.
///
/// When the target has one dimension fewer than the prediction (e.g. `(N)`
/// labels against `(N, 1)` regression outputs), a trailing axis is added
/// to the target first.
#[derive(Debug, Clone, Copy, Default)]
pub struct MSELoss {
    reduction: Reduction,
}

impl MSELoss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reduction(reduction: Reduction) -> Self {
        MSELoss { reduction }
    }
}

impl Loss for MSELoss {
    fn compute(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
        let target = if target.ndim() + 1 == prediction.ndim() {
            ops::unsqueeze(target, -1)?
        } else {
            target.clone()
        };
        self.reduction.apply(F::squared_error(prediction, &target)?)
    }

    fn name(&self) -> &'static str {
        "MSE"
    }
}

// --- Negative Log Likelihood Loss ---

/// Expects `(N, C)` log-probabilities and `(N)` class indices.
#[derive(Debug, Clone, Copy, Default)]
pub struct NLLLoss {
    reduction: Reduction,
}

impl NLLLoss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reduction(reduction: Reduction) -> Self {
        NLLLoss { reduction }
    }
}

impl Loss for NLLLoss {
    fn compute(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
        self.reduction.apply(F::nll(prediction, target)?)
    }

    fn name(&self) -> &'static str {
        "NLL"
    }
}

// --- Cross Entropy Loss ---

/// Cross entropy between `(N, C)` logits and `(N)` class indices.
/// Combines log-softmax and NLL in one step.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss {
    reduction: Reduction,
}

impl CrossEntropyLoss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reduction(reduction: Reduction) -> Self {
        CrossEntropyLoss { reduction }
    }
}

impl Loss for CrossEntropyLoss {
    fn compute(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
        self.reduction.apply(F::cross_entropy(prediction, target)?)
    }

    fn name(&self) -> &'static str {
        "CrossEntropy"
    }
}

// --- Selection from configuration ---

/// The `loss` setting of [`FedConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    /// `""`: resolve `get_loss` through the registry.
    Custom,
    CrossEntropy,
    Mse,
}

impl FromStr for LossKind {
    type Err = LossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(LossKind::Custom),
            "CrossEntropy" => Ok(LossKind::CrossEntropy),
            "MSE" => Ok(LossKind::Mse),
            other => Err(LossError::Unknown(other.to_string())),
        }
    }
}

/// Registry preloaded with the built-in losses under the `nn.loss` module.
pub fn builtin_losses() -> LossRegistry {
    let mut registry = LossRegistry::new();
    registry.register("nn.loss", "CrossEntropyLoss", || Box::new(CrossEntropyLoss::new()) as Box<dyn Loss>);
    registry.register("nn.loss", "MSELoss", || Box::new(MSELoss::new()) as Box<dyn Loss>);
    registry.register("nn.loss", "NLLLoss", || Box::new(NLLLoss::new()) as Box<dyn Loss>);
    registry
}

/// Picks the loss named by `cfg.loss`; an empty name resolves
/// `cfg.get_loss` in `registry` and calls the registered constructor.
pub fn get_loss_func(cfg: &FedConfig, registry: &LossRegistry) -> Result<Box<dyn Loss>, LossError> {
    let loss: Box<dyn Loss> = match cfg.loss.parse::<LossKind>()? {
        LossKind::Custom => registry.resolve(&cfg.get_loss)?(),
        LossKind::CrossEntropy => Box::new(CrossEntropyLoss::new()),
        LossKind::Mse => Box::new(MSELoss::new()),
    };
    tracing::debug!(loss = loss.name(), "selected loss function");
    Ok(loss)
}
