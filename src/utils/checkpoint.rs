//! # Model Checkpoints
//!
//! One checkpoint per training round, named
//! `<save_model_filename>_Round_<round>.pt` and never overwritten.

use crate::config::FedConfig;
use crate::nn::Module;
use crate::utils::naming::{create_unique, ensure_dir};
use crate::utils::serialization::{load_state, state_dict, write_data, DataFormat, SerializationError};
use std::fs;
use std::path::PathBuf;

pub const CHECKPOINT_EXT: &str = ".pt";

/// Saves the full state (parameters and buffers) of `model` after `round`
/// and returns the file written.
pub fn save_model_iteration(round: usize, model: &dyn Module, cfg: &FedConfig) -> Result<PathBuf, SerializationError> {
    ensure_dir(&cfg.save_model_dirname)?;
    let stem = format!("{}_Round_{}", cfg.save_model_filename, round);
    let state = state_dict(model, true)?;
    let (path, file) = create_unique(&cfg.save_model_dirname, &stem, CHECKPOINT_EXT)?;

    if let Err(e) = write_data(&state, DataFormat::Bincode, file) {
        // Do not leave a truncated checkpoint behind.
        let _ = fs::remove_file(&path);
        return Err(e);
    }
    tracing::info!(round, path = %path.display(), "saved model checkpoint");
    Ok(path)
}

/// Path [`load_model`] reads from.
pub fn model_path(cfg: &FedConfig) -> PathBuf {
    cfg.load_model_dirname
        .join(format!("{}{}", cfg.load_model_filename, CHECKPOINT_EXT))
}

/// Restores `<load_model_dirname>/<load_model_filename>.pt` into `model`
/// and switches it to evaluation mode. Keys and shapes must match exactly.
pub fn load_model(cfg: &FedConfig, model: &mut dyn Module) -> Result<(), SerializationError> {
    let path = model_path(cfg);
    load_state(&*model, &path, true, true)?;
    model.eval();
    tracing::info!(path = %path.display(), "loaded model checkpoint");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Dropout, Linear, Sequential};
    use tempfile::TempDir;

    fn config(dir: &std::path::Path) -> FedConfig {
        FedConfig {
            save_model_dirname: dir.join("ckpt"),
            save_model_filename: "mnist".to_string(),
            load_model_dirname: dir.join("ckpt"),
            load_model_filename: "mnist_Round_3".to_string(),
            ..FedConfig::default()
        }
    }

    fn model() -> Sequential {
        Sequential::new()
            .add(Linear::new(4, 4, true))
            .add(Dropout::new(0.2).unwrap())
            .add(Linear::new(4, 2, false))
    }

    #[test]
    fn repeated_saves_of_a_round_get_new_files() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path());
        let m = model();

        let first = save_model_iteration(3, &m, &cfg).unwrap();
        let second = save_model_iteration(3, &m, &cfg).unwrap();
        let other_round = save_model_iteration(4, &m, &cfg).unwrap();

        assert_eq!(first, dir.path().join("ckpt/mnist_Round_3.pt"));
        assert_eq!(second, dir.path().join("ckpt/mnist_Round_3_1.pt"));
        assert_eq!(other_round, dir.path().join("ckpt/mnist_Round_4.pt"));
    }

    #[test]
    fn save_skips_a_checkpoint_that_appeared_meanwhile() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path());
        std::fs::create_dir_all(&cfg.save_model_dirname).unwrap();
        let foreign = cfg.save_model_dirname.join("mnist_Round_3.pt");
        std::fs::write(&foreign, b"not ours").unwrap();

        let path = save_model_iteration(3, &model(), &cfg).unwrap();
        assert_eq!(path, dir.path().join("ckpt/mnist_Round_3_1.pt"));
        assert_eq!(std::fs::read(&foreign).unwrap(), b"not ours");
    }

    #[test]
    fn failed_load_model_keeps_weights_and_mode() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path());
        let saved = Sequential::new().add(Linear::new(4, 4, true)).add(Linear::new(4, 2, false));
        save_model_iteration(3, &saved, &cfg).unwrap();

        let mut wider = Sequential::new().add(Linear::new(4, 4, true)).add(Linear::new(4, 3, false));
        let before = state_dict(&wider, true).unwrap();
        let err = load_model(&cfg, &mut wider).unwrap_err();
        assert!(matches!(err, SerializationError::ShapeMismatch { .. }));
        assert_eq!(state_dict(&wider, true).unwrap(), before);
        assert!(wider.is_training());
    }

    #[test]
    fn load_model_restores_weights_and_sets_eval() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path());
        let saved = model();
        save_model_iteration(3, &saved, &cfg).unwrap();

        let mut restored = model();
        load_model(&cfg, &mut restored).unwrap();
        assert!(!restored.is_training());
        assert_eq!(state_dict(&saved, true).unwrap(), state_dict(&restored, true).unwrap());
    }

    #[test]
    fn load_model_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut m = model();
        let err = load_model(&config(dir.path()), &mut m).unwrap_err();
        assert!(matches!(err, SerializationError::Io(_)));
        assert!(m.is_training());
    }
}
