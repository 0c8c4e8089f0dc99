//! # Evaluation Metrics

use crate::tensor::{TensorData, TensorError};
use ndarray::{ArrayD, Axis};

/// Scores predictions against true labels: `metric(y_true, y_pred)`.
pub type Metric = fn(&ArrayD<TensorData>, &ArrayD<TensorData>) -> Result<f64, TensorError>;

/// Accuracy in percent.
///
/// 1-D predictions are treated as scores and rounded to the nearest label;
/// anything wider picks the arg-max class along axis 1. The predicted
/// labels are then compared element-wise with `y_true`.
pub fn default_metric(y_true: &ArrayD<TensorData>, y_pred: &ArrayD<TensorData>) -> Result<f64, TensorError> {
    let predicted = predicted_labels(y_pred)?;
    if predicted.is_empty() {
        return Err(TensorError::Empty("default_metric".to_string()));
    }
    if predicted.len() != y_true.len() {
        return Err(TensorError::IncompatibleShapes {
            op: "default_metric".to_string(),
            shape1: y_true.shape().to_vec(),
            shape2: y_pred.shape().to_vec(),
        });
    }

    let matches = predicted
        .iter()
        .zip(y_true.iter())
        .filter(|(p, t)| p == t)
        .count();
    Ok(100.0 * matches as f64 / predicted.len() as f64)
}

fn predicted_labels(y_pred: &ArrayD<TensorData>) -> Result<Vec<TensorData>, TensorError> {
    match y_pred.ndim() {
        0 => Err(TensorError::RankMismatch {
            op: "default_metric".to_string(),
            expected: 1,
            got: 0,
        }),
        1 => Ok(y_pred.iter().map(|v| v.round()).collect()),
        _ => {
            if y_pred.len_of(Axis(1)) == 0 {
                return Err(TensorError::Empty("default_metric".to_string()));
            }
            let labels = y_pred.map_axis(Axis(1), |lane| {
                let mut best = 0usize;
                for (i, &v) in lane.iter().enumerate() {
                    if v > lane[best] {
                        best = i;
                    }
                }
                best as TensorData
            });
            Ok(labels.iter().copied().collect())
        }
    }
}
