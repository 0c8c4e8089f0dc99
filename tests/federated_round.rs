//! End-to-end flows over the public API: configuration to loaders and loss,
//! a checkpointed round, and validation of the restored model.

use fedtorch::config::{DataMode, FedConfig, FuncConfig};
use fedtorch::data::{get_dataloader, Dataset, TensorDataset};
use fedtorch::nn::loss::builtin_losses;
use fedtorch::nn::{get_loss_func, Linear, Module, ReLU, Sequential};
use fedtorch::utils::checkpoint::{load_model, save_model_iteration};
use fedtorch::utils::logging::client_log;
use fedtorch::utils::serialization::{dump_data_to_file, load_data_from_file, state_dict};
use fedtorch::utils::validation::validation;
use ndarray::{Array1, Array2};
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

fn blobs(n: usize) -> Arc<dyn Dataset> {
    // Two classes separated by the sign of the first feature.
    let inputs = Array2::from_shape_fn((n, 3), |(i, j)| {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        if j == 0 {
            sign * (1.0 + i as f32 / n as f32)
        } else {
            (i * j % 5) as f32 / 5.0
        }
    })
    .into_dyn();
    let targets = Array1::from_shape_fn(n, |i| if i % 2 == 0 { 1.0 } else { 0.0 }).into_dyn();
    Arc::new(TensorDataset::new(inputs, targets).unwrap())
}

fn model() -> Sequential {
    Sequential::new()
        .add(Linear::new(3, 8, true))
        .add(ReLU::new())
        .add(Linear::new(8, 2, true))
}

fn write_config(dir: &TempDir) -> FedConfig {
    let root = dir.path().display().to_string().replace('\\', "/");
    let toml = format!(
        r#"
output_dirname = "{root}/logs"
output_filename = "run"
save_model_dirname = "{root}/models"
save_model_filename = "mlp"
load_model_dirname = "{root}/models"
load_model_filename = "mlp_Round_2"
loss = ""
train_data_batch_size = 8
test_data_batch_size = 5
num_workers = 2
seed = 42

[get_loss]
module = "nn.loss"
call = "CrossEntropyLoss"
"#
    );
    let path = dir.path().join("fed.toml");
    std::fs::write(&path, toml).unwrap();
    FedConfig::from_file(&path).unwrap()
}

#[test]
fn config_drives_loaders_and_loss() {
    let dir = TempDir::new().unwrap();
    let cfg = write_config(&dir);
    cfg.apply_seed();

    let train = get_dataloader(&cfg, Some(blobs(30)), DataMode::Train).unwrap().unwrap();
    assert_eq!((train.batch_size(), train.shuffle(), train.len()), (8, true, 4));
    let test = get_dataloader(&cfg, Some(blobs(30)), DataMode::Test).unwrap().unwrap();
    assert_eq!((test.batch_size(), test.shuffle(), test.len()), (5, false, 6));
    assert!(get_dataloader(&cfg, None, DataMode::Val).unwrap().is_none());

    let loss = get_loss_func(&cfg, &builtin_losses()).unwrap();
    assert_eq!(loss.name(), "CrossEntropy");

    let mut missing = cfg.clone();
    missing.get_loss = FuncConfig::new("nn.loss", "HuberLoss");
    assert!(get_loss_func(&missing, &builtin_losses()).is_err());
}

#[test]
fn checkpointed_round_validates_identically_after_reload() {
    let dir = TempDir::new().unwrap();
    let cfg = write_config(&dir);
    cfg.apply_seed();

    let trained = model();
    let loss = get_loss_func(&cfg, &builtin_losses()).unwrap();
    let val = get_dataloader(&cfg, Some(blobs(20)), DataMode::Val).unwrap();

    let before = validation(&trained, Some(&*loss), val.as_ref(), None).unwrap();
    assert!(trained.is_training());
    assert!((0.0..=100.0).contains(&before.1));

    let first = save_model_iteration(2, &trained, &cfg).unwrap();
    let second = save_model_iteration(2, &trained, &cfg).unwrap();
    assert_eq!(first.file_name().unwrap(), "mlp_Round_2.pt");
    assert_eq!(second.file_name().unwrap(), "mlp_Round_2_1.pt");

    let mut restored = model();
    load_model(&cfg, &mut restored).unwrap();
    assert!(!restored.is_training());
    assert_eq!(state_dict(&trained, true).unwrap(), state_dict(&restored, true).unwrap());

    let after = validation(&restored, Some(&*loss), val.as_ref(), None).unwrap();
    assert!((before.0 - after.0).abs() < 1e-9);
    assert_eq!(before.1, after.1);
}

#[test]
fn client_side_files() {
    let dir = TempDir::new().unwrap();
    let cfg = write_config(&dir);

    let mut log = client_log(&cfg.output_dirname, "client_0").unwrap();
    writeln!(log, "round 1 loss 0.42").unwrap();
    let second = client_log(&cfg.output_dirname, "client_0").unwrap();
    assert_ne!(log.path(), second.path());
    assert!(second.path().ends_with("client_0_1.txt"));

    let weights: Vec<f32> = vec![0.5, 0.25, 0.125];
    let path = dir.path().join("weights.json");
    assert!(dump_data_to_file(&weights, &path).unwrap());
    let back: Vec<f32> = load_data_from_file(&path).unwrap();
    assert_eq!(back, weights);
}
