//! # Crate Error Type
//!
//! Each module reports failures through its own error enum; `Error` wraps
//! them for functions that cross module boundaries.

use thiserror::Error;

use crate::config::ConfigError;
use crate::data::DataError;
use crate::nn::LossError;
use crate::tensor::TensorError;
use crate::utils::logging::LoggingError;
use crate::utils::registry::RegistryError;
use crate::utils::serialization::SerializationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Loss error: {0}")]
    Loss(#[from] LossError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
