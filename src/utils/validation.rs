//! # Validation and Test Evaluation
//!
//! Scores a model on held-out data without disturbing the caller's copy:
//! [`validation`] evaluates a deep copy in eval mode, so the original keeps
//! its parameters and its train/eval mode.

use crate::data::{DataError, DataLoader};
use crate::error::Result;
use crate::nn::{forward_no_grad, Loss, Module};
use crate::tensor::{ops, Device, Tensor};
use crate::utils::metrics::{default_metric, Metric};

/// Average loss over the batches of `dataloader` and accuracy from
/// `metric` (or [`default_metric`]).
///
/// Returns `(0.0, 0.0)` when there is no loss function or no loader.
/// A loader that yields no batches is an error.
pub fn validation(
    model: &dyn Module,
    loss_fn: Option<&dyn Loss>,
    dataloader: Option<&DataLoader>,
    metric: Option<Metric>,
) -> Result<(f64, f64)> {
    let (Some(loss_fn), Some(dataloader)) = (loss_fn, dataloader) else {
        return Ok((0.0, 0.0));
    };

    let device = Device::best_available();
    let mut validation_model = model.boxed_clone()?;
    validation_model.to_device(device);
    validation_model.eval();

    let mut total_loss = 0.0f64;
    let mut batches = 0usize;
    for batch in dataloader {
        let (inputs, targets) = batch?;
        let output = forward_no_grad(&*validation_model, &inputs.to(device))?;
        total_loss += f64::from(loss_fn.compute(&output, &targets.to(device))?.item()?);
        batches += 1;
    }
    if batches == 0 {
        return Err(DataError::Empty.into());
    }
    let loss = total_loss / batches as f64;

    let accuracy = evaluate_model_on_tests(&mut *validation_model, dataloader, metric)?;
    tracing::debug!(loss, accuracy, batches, "validation finished");
    Ok((loss, accuracy))
}

/// Switches `model` to eval mode, predicts every batch of `dataloader` and
/// scores all predictions at once with `metric` (or [`default_metric`]).
pub fn evaluate_model_on_tests(model: &mut dyn Module, dataloader: &DataLoader, metric: Option<Metric>) -> Result<f64> {
    let metric = metric.unwrap_or(default_metric);
    model.eval();

    let mut predictions: Vec<Tensor> = Vec::with_capacity(dataloader.len());
    let mut targets: Vec<Tensor> = Vec::with_capacity(dataloader.len());
    for batch in dataloader {
        let (inputs, target) = batch?;
        predictions.push(forward_no_grad(&*model, &inputs)?);
        targets.push(target);
    }
    if predictions.is_empty() {
        return Err(DataError::Empty.into());
    }

    let y_pred = ops::concat(&predictions)?.data_clone()?;
    let y_true = ops::concat(&targets)?.data_clone()?;
    Ok(metric(&y_true, &y_pred)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, TensorDataset};
    use crate::error::Error;
    use crate::nn::{CrossEntropyLoss, Dropout, Linear, MSELoss, Sequential};
    use crate::tensor::TensorError;
    use ndarray::{arr1, arr2};
    use std::sync::Arc;

    /// Linear layer whose class-1 logit equals the first input feature.
    fn classifier() -> Linear {
        let weight = Tensor::from_vec(vec![0.0, 0.0, 1.0, 0.0], &[2, 2]).unwrap();
        Linear::from_tensors(weight, None).unwrap()
    }

    fn loader(batch_size: usize) -> DataLoader {
        // Positive first feature means class 1.
        let inputs = arr2(&[[2.0, 0.0], [-1.0, 0.0], [3.0, 1.0], [-2.0, 5.0]]).into_dyn();
        let targets = arr1(&[1.0, 0.0, 1.0, 1.0]).into_dyn();
        let ds: Arc<dyn Dataset> = Arc::new(TensorDataset::new(inputs, targets).unwrap());
        DataLoader::new(ds, batch_size, false, 0).unwrap()
    }

    #[test]
    fn missing_loss_or_loader_gives_zeros() {
        let model = classifier();
        let pairs = loader(2);
        let loss = CrossEntropyLoss::new();
        assert_eq!(validation(&model, None, Some(&pairs), None).unwrap(), (0.0, 0.0));
        assert_eq!(validation(&model, Some(&loss), None, None).unwrap(), (0.0, 0.0));
    }

    #[test]
    fn reports_average_loss_and_accuracy() {
        let model = classifier();
        let pairs = loader(2);
        let loss = CrossEntropyLoss::new();
        let (avg_loss, accuracy) = validation(&model, Some(&loss), Some(&pairs), None).unwrap();
        assert_eq!(accuracy, 75.0);
        assert!(avg_loss > 0.0);

        // One batch covering everything gives the same mean loss.
        let (whole, _) = validation(&model, Some(&loss), Some(&loader(4)), None).unwrap();
        assert!((avg_loss - whole).abs() < 1e-6);
    }

    #[test]
    fn caller_model_keeps_its_mode() {
        let model = Sequential::new().add(classifier()).add(Dropout::new(0.5).unwrap());
        assert!(model.is_training());
        let loss = CrossEntropyLoss::new();
        let (_, accuracy) = validation(&model, Some(&loss), Some(&loader(3)), None).unwrap();
        assert!(model.is_training());
        // Dropout is off in the evaluated copy, so the result is exact.
        assert_eq!(accuracy, 75.0);
    }

    #[test]
    fn custom_metric_is_used() {
        fn always_half(_: &ndarray::ArrayD<f32>, _: &ndarray::ArrayD<f32>) -> std::result::Result<f64, TensorError> {
            Ok(50.0)
        }
        let model = classifier();
        let loss = CrossEntropyLoss::new();
        let (_, accuracy) = validation(&model, Some(&loss), Some(&loader(2)), Some(always_half)).unwrap();
        assert_eq!(accuracy, 50.0);
    }

    #[test]
    fn regression_targets_are_unsqueezed() {
        let weight = Tensor::from_vec(vec![1.0, 0.0], &[1, 2]).unwrap();
        let model = Linear::from_tensors(weight, None).unwrap();
        let loss = MSELoss::new();
        // Prediction equals the first feature; targets are off by one for one sample.
        let inputs = arr2(&[[1.0, 0.0], [2.0, 0.0]]).into_dyn();
        let targets = arr1(&[1.0, 3.0]).into_dyn();
        let ds: Arc<dyn Dataset> = Arc::new(TensorDataset::new(inputs, targets).unwrap());
        let loader = DataLoader::new(ds, 2, false, 0).unwrap();
        let (avg_loss, _) = validation(&model, Some(&loss), Some(&loader), None).unwrap();
        assert!((avg_loss - 0.5).abs() < 1e-6);
    }

    #[test]
    fn evaluate_sets_eval_mode() {
        let mut model = Sequential::new().add(classifier());
        assert!(model.is_training());
        let accuracy = evaluate_model_on_tests(&mut model, &loader(2), None).unwrap();
        assert!(!model.is_training());
        assert_eq!(accuracy, 75.0);
    }

    #[test]
    fn empty_loader_is_an_error() {
        let inputs = ndarray::ArrayD::<f32>::zeros(ndarray::IxDyn(&[0, 2]));
        let targets = ndarray::ArrayD::<f32>::zeros(ndarray::IxDyn(&[0]));
        let ds: Arc<dyn Dataset> = Arc::new(TensorDataset::new(inputs, targets).unwrap());
        let loader = DataLoader::new(ds, 2, false, 0).unwrap();
        let loss = CrossEntropyLoss::new();
        let err = validation(&classifier(), Some(&loss), Some(&loader), None).unwrap_err();
        assert!(matches!(err, Error::Data(DataError::Empty)));
    }
}
