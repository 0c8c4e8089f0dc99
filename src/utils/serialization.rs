//! # Data and Model Serialization
//!
//! Generic load/dump of any `serde` value, with the format chosen by file
//! extension:
//!
//! | Extensions | Format |
//! |---|---|
//! | `.pt`, `.pth` | `bincode` (tensor files, checkpoints) |
//! | `.json` | `serde_json` |
//!
//! Plus state-dict save/load for [`Module`]s, which goes through the same
//! dispatch.

use crate::nn::Module;
use crate::tensor::{Tensor, TensorData, TensorError};
use crate::utils::finite::{self, FloatCheckError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub const TENSOR_EXT: &[&str] = &[".pt", ".pth"];
pub const JSON_EXT: &[&str] = &[".json"];

// --- Error Type ---
#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization Error (Bincode): {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Serialization Error (JSON): {0}")]
    Json(#[from] serde_json::Error),
    #[error("File extension {0} is not supported")]
    UnsupportedExtension(String),
    #[error("JSON cannot represent the non-finite value {0}; use a .pt or .pth file")]
    NonFiniteFloat(f64),
    #[error("Tensor shape mismatch during loading: key '{key}', expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Missing key in state dict during loading: '{0}'")]
    MissingKey(String),
    #[error("Unexpected key in state dict during loading: '{0}'")]
    UnexpectedKey(String),
    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),
}

// --- Format dispatch ---

/// On-disk format selected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Bincode,
    Json,
}

impl DataFormat {
    pub fn from_path(path: &Path) -> Result<Self, SerializationError> {
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        if TENSOR_EXT.contains(&ext.as_str()) {
            Ok(DataFormat::Bincode)
        } else if JSON_EXT.contains(&ext.as_str()) {
            Ok(DataFormat::Json)
        } else {
            Err(SerializationError::UnsupportedExtension(ext))
        }
    }
}

/// Reads a value from `file_path`, picking the reader from the extension.
pub fn load_data_from_file<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T, SerializationError> {
    let path = file_path.as_ref();
    let format = DataFormat::from_path(path)?;
    let reader = BufReader::new(File::open(path)?);
    let value = match format {
        DataFormat::Bincode => bincode::deserialize_from(reader)?,
        DataFormat::Json => serde_json::from_reader(reader)?,
    };
    tracing::debug!(path = %path.display(), ?format, "loaded data");
    Ok(value)
}

/// Writes `obj` to `file_path`, picking the writer from the extension.
/// Returns `true` once the data is flushed. An existing file at
/// `file_path` is replaced.
///
/// JSON output is checked for `NaN` and infinities first; they are
/// rejected before the file is touched.
pub fn dump_data_to_file<T: Serialize + ?Sized>(obj: &T, file_path: impl AsRef<Path>) -> Result<bool, SerializationError> {
    let path = file_path.as_ref();
    let format = DataFormat::from_path(path)?;
    if format == DataFormat::Json {
        ensure_json_representable(obj)?;
    }
    write_data(obj, format, File::create(path)?)?;
    tracing::debug!(path = %path.display(), ?format, "dumped data");
    Ok(true)
}

/// Serializes `obj` into an already open file.
pub(crate) fn write_data<T: Serialize + ?Sized>(obj: &T, format: DataFormat, file: File) -> Result<(), SerializationError> {
    let mut writer = BufWriter::new(file);
    match format {
        DataFormat::Bincode => bincode::serialize_into(&mut writer, obj)?,
        DataFormat::Json => serde_json::to_writer(&mut writer, obj)?,
    }
    writer.flush()?;
    Ok(())
}

fn ensure_json_representable<T: Serialize + ?Sized>(obj: &T) -> Result<(), SerializationError> {
    match finite::check(obj) {
        Err(FloatCheckError::NonFinite(value)) => Err(SerializationError::NonFiniteFloat(value)),
        // Any other failure is reported by the real serializer.
        _ => Ok(()),
    }
}

// --- Serializable Tensor ---

/// Shape plus flat row-major data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SerializableTensor {
    pub shape: Vec<usize>,
    pub data: Vec<TensorData>,
}

impl SerializableTensor {
    pub fn from_tensor(tensor: &Tensor) -> Result<Self, TensorError> {
        Ok(SerializableTensor {
            shape: tensor.shape().to_vec(),
            data: tensor.to_vec()?,
        })
    }

    pub fn to_ndarray(&self) -> Result<ndarray::ArrayD<TensorData>, TensorError> {
        Ok(ndarray::ArrayD::from_shape_vec(
            ndarray::IxDyn(&self.shape),
            self.data.clone(),
        )?)
    }

    pub fn into_tensor(self) -> Result<Tensor, TensorError> {
        Tensor::from_vec(self.data, &self.shape)
    }
}

impl Serialize for Tensor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SerializableTensor::from_tensor(self)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        SerializableTensor::deserialize(deserializer)?
            .into_tensor()
            .map_err(serde::de::Error::custom)
    }
}

// --- State Dictionary ---

/// Parameter (and buffer) name to tensor data, in name order.
pub type StateDict = BTreeMap<String, SerializableTensor>;

/// Snapshot of a module's tensors.
pub fn state_dict(module: &dyn Module, include_buffers: bool) -> Result<StateDict, TensorError> {
    let tensors = if include_buffers {
        module.tensors()
    } else {
        module.parameters()
    };
    tensors
        .iter()
        .map(|(key, tensor)| Ok::<_, TensorError>((key.clone(), SerializableTensor::from_tensor(tensor)?)))
        .collect()
}

/// Copies `loaded` into the module's tensors.
///
/// With `strict`, missing and unexpected keys are errors. Otherwise they
/// are skipped with a warning. Shape mismatches are always errors. On any
/// error no tensor of the module has been modified.
pub fn load_state_dict(
    module: &dyn Module,
    loaded: &StateDict,
    strict: bool,
    include_buffers: bool,
) -> Result<(), SerializationError> {
    let module_tensors = if include_buffers {
        module.tensors()
    } else {
        module.parameters()
    };

    if strict {
        if let Some(key) = module_tensors.keys().find(|k| !loaded.contains_key(*k)) {
            return Err(SerializationError::MissingKey(key.clone()));
        }
        if let Some(key) = loaded.keys().find(|k| !module_tensors.contains_key(*k)) {
            return Err(SerializationError::UnexpectedKey(key.clone()));
        }
    }

    // Every shape is checked before anything is written, so a failed load
    // leaves the module untouched.
    let mut matched = Vec::with_capacity(module_tensors.len());
    for (key, target) in &module_tensors {
        let Some(source) = loaded.get(key) else {
            tracing::warn!(%key, "key not found in loaded state dict; skipping");
            continue;
        };
        if source.shape != target.shape() {
            return Err(SerializationError::ShapeMismatch {
                key: key.clone(),
                expected: target.shape().to_vec(),
                got: source.shape.clone(),
            });
        }
        matched.push((key, target, source.to_ndarray()?));
    }

    let mut unused: BTreeSet<&String> = loaded.keys().collect();
    for (key, target, values) in matched {
        target.assign(&values)?;
        unused.remove(key);
    }

    for key in unused {
        tracing::warn!(%key, "key in loaded state dict not used by the module");
    }
    Ok(())
}

/// Saves the module's state dict to `path` (format by extension).
pub fn save_state(module: &dyn Module, path: impl AsRef<Path>, include_buffers: bool) -> Result<(), SerializationError> {
    let state = state_dict(module, include_buffers)?;
    dump_data_to_file(&state, path)?;
    Ok(())
}

/// Loads a state dict from `path` into the module.
pub fn load_state(
    module: &dyn Module,
    path: impl AsRef<Path>,
    strict: bool,
    include_buffers: bool,
) -> Result<(), SerializationError> {
    let state: StateDict = load_data_from_file(path)?;
    load_state_dict(module, &state, strict, include_buffers)
}
