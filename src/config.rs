//! # Configuration
//!
//! The shared configuration object read by the logging, checkpoint, loss and
//! data-loader utilities. Every field has a default so a partial TOML file
//! is enough.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO Error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Names a function to resolve through a [`crate::utils::registry::Registry`].
///
/// `module` + `call` select a registered entry. `source` marks an inline
/// strategy; its text is never executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuncConfig {
    pub module: String,
    pub call: String,
    pub source: String,
}

impl FuncConfig {
    pub fn new(module: impl Into<String>, call: impl Into<String>) -> Self {
        FuncConfig {
            module: module.into(),
            call: call.into(),
            source: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FedConfig {
    /// Directory of the server log file.
    pub output_dirname: PathBuf,
    /// Base name of the server log file; `_server` is appended.
    pub output_filename: String,

    pub load_model_dirname: PathBuf,
    pub load_model_filename: String,
    pub save_model_dirname: PathBuf,
    pub save_model_filename: String,

    /// `"CrossEntropy"`, `"MSE"`, or `""` to resolve `get_loss`.
    pub loss: String,
    pub get_loss: FuncConfig,

    pub train_data_batch_size: usize,
    pub train_data_shuffle: bool,
    pub test_data_batch_size: usize,
    pub test_data_shuffle: bool,
    pub num_workers: usize,

    /// Applied with [`FedConfig::apply_seed`].
    pub seed: u64,
}

impl Default for FedConfig {
    fn default() -> Self {
        FedConfig {
            output_dirname: PathBuf::from("output"),
            output_filename: "result".to_string(),
            load_model_dirname: PathBuf::from("models"),
            load_model_filename: "model".to_string(),
            save_model_dirname: PathBuf::from("models"),
            save_model_filename: "model".to_string(),
            loss: "CrossEntropy".to_string(),
            get_loss: FuncConfig::default(),
            train_data_batch_size: 64,
            train_data_shuffle: true,
            test_data_batch_size: 64,
            test_data_shuffle: false,
            num_workers: 0,
            seed: crate::utils::random::DEFAULT_SEED,
        }
    }
}

impl FedConfig {
    /// Loads a configuration from a TOML file and validates it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: FedConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Seeds the crate's random sources from `seed`. See
    /// [`crate::utils::random::set_seed`].
    pub fn apply_seed(&self) {
        crate::utils::random::set_seed(self.seed);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.train_data_batch_size == 0 || self.test_data_batch_size == 0 {
            return Err(ConfigError::Invalid("batch sizes must be positive".to_string()));
        }
        if self.output_filename.is_empty() || self.save_model_filename.is_empty() {
            return Err(ConfigError::Invalid(
                "output_filename and save_model_filename must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which split a data loader serves. Training uses the `train_data_*`
/// settings, the other two share the `test_data_*` settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    Train,
    Val,
    Test,
}

impl FromStr for DataMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(DataMode::Train),
            "val" => Ok(DataMode::Val),
            "test" => Ok(DataMode::Test),
            other => Err(ConfigError::Invalid(format!(
                "data mode must be one of train, val, test; got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataMode::Train => "train",
            DataMode::Val => "val",
            DataMode::Test => "test",
        };
        f.write_str(name)
    }
}
