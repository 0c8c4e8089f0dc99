//! # fedtorch
//!
//! Support utilities for a federated-learning framework: model validation
//! and test evaluation, server and client log files, per-round checkpoints,
//! seeding, function resolution from configuration, loss selection,
//! extension-dispatched (de)serialization and data-loader construction.
//!
//! The crate carries the small CPU tensor and layer library these utilities
//! operate on (`tensor`, `nn`). There is no autograd; training loops and
//! optimizers live with the caller.

pub mod config;
pub mod data;
pub mod error;
pub mod nn;
pub mod tensor;
pub mod utils;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::config::{DataMode, FedConfig, FuncConfig};
    pub use crate::data::{get_dataloader, DataLoader, Dataset, TensorDataset};
    pub use crate::nn::{get_loss_func, Loss, Module, Sequential};
    pub use crate::tensor::{Device, Tensor};
    pub use crate::utils::{
        create_custom_logger, evaluate_model_on_tests, load_model, save_model_iteration, set_seed, validation,
    };
}
