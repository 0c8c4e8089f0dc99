//! # Tensor Operations
//!
//! Eager mathematical operations on Tensors. Results are fresh tensors;
//! `requires_grad` propagates as metadata when any input carries it.

use super::{Tensor, TensorData, TensorError};
use ndarray::{ArrayD, Axis, Ix1, Ix2, IxDyn};

/// Wraps the result of an operation, carrying `requires_grad` over from the inputs.
fn op_result(result_data: ArrayD<TensorData>, inputs: &[&Tensor]) -> Tensor {
    let requires_grad = inputs.iter().any(|t| t.requires_grad());
    Tensor::new(result_data, requires_grad)
}

// --- Broadcasting ---

/// Checks if tensor shapes can be broadcast together following NumPy broadcasting rules
pub fn can_broadcast(shape1: &[usize], shape2: &[usize]) -> bool {
    shape1
        .iter()
        .rev()
        .zip(shape2.iter().rev())
        .all(|(&s1, &s2)| s1 == s2 || s1 == 1 || s2 == 1)
}

/// Determines the output shape after broadcasting two tensors
pub fn broadcast_shapes(shape1: &[usize], shape2: &[usize]) -> Result<Vec<usize>, TensorError> {
    if !can_broadcast(shape1, shape2) {
        return Err(TensorError::IncompatibleShapes {
            op: "broadcast".to_string(),
            shape1: shape1.to_vec(),
            shape2: shape2.to_vec(),
        });
    }

    let max_dims = shape1.len().max(shape2.len());
    let padded_shape1 = pad_shape_left(shape1, max_dims);
    let padded_shape2 = pad_shape_left(shape2, max_dims);

    Ok(padded_shape1
        .iter()
        .zip(padded_shape2.iter())
        .map(|(&a, &b)| a.max(b))
        .collect())
}

/// Pads a shape with 1s on the left to match the target length
fn pad_shape_left(shape: &[usize], target_len: usize) -> Vec<usize> {
    if shape.len() >= target_len {
        return shape.to_vec();
    }
    let mut padded = vec![1; target_len - shape.len()];
    padded.extend_from_slice(shape);
    padded
}

/// Applies `f` element-wise after broadcasting both operands to a common shape.
fn broadcast_binary(
    op: &str,
    a: &Tensor,
    b: &Tensor,
    f: impl Fn(TensorData, TensorData) -> TensorData,
) -> Result<Tensor, TensorError> {
    let output_shape = broadcast_shapes(a.shape(), b.shape()).map_err(|_| {
        TensorError::IncompatibleShapes {
            op: op.to_string(),
            shape1: a.shape().to_vec(),
            shape2: b.shape().to_vec(),
        }
    })?;

    let a_data = a.data()?;
    let b_data = b.data()?;
    let incompatible = || TensorError::IncompatibleShapes {
        op: op.to_string(),
        shape1: a.shape().to_vec(),
        shape2: b.shape().to_vec(),
    };
    let a_view = a_data.broadcast(IxDyn(&output_shape)).ok_or_else(incompatible)?;
    let b_view = b_data.broadcast(IxDyn(&output_shape)).ok_or_else(incompatible)?;

    let mut result_data = a_view.to_owned();
    result_data.zip_mut_with(&b_view, |x, &y| *x = f(*x, y));
    Ok(op_result(result_data, &[a, b]))
}

// --- Arithmetic Operations ---

/// Element-wise addition with broadcasting.
pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    broadcast_binary("add", a, b, |x, y| x + y)
}

/// Element-wise subtraction (a - b) with broadcasting.
pub fn sub(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    broadcast_binary("sub", a, b, |x, y| x - y)
}

/// Element-wise multiplication with broadcasting.
pub fn mul(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    broadcast_binary("mul", a, b, |x, y| x * y)
}

/// Multiply a tensor by a scalar.
pub fn mul_scalar(a: &Tensor, scalar: TensorData) -> Result<Tensor, TensorError> {
    let result_data = &*a.data()? * scalar;
    Ok(op_result(result_data, &[a]))
}

// --- Matrix Operations ---

/// Matrix multiplication of two tensors.
/// Handles 1D (vector) and 2D (matrix) operands.
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    let a_data = a.data()?;
    let b_data = b.data()?;
    let incompatible = |op: &str| TensorError::IncompatibleShapes {
        op: op.to_string(),
        shape1: a.shape().to_vec(),
        shape2: b.shape().to_vec(),
    };

    let result_data = match (a.ndim(), b.ndim()) {
        // [n] @ [n] -> scalar
        (1, 1) => {
            if a.shape()[0] != b.shape()[0] {
                return Err(incompatible("matmul (vec-vec)"));
            }
            let a_view = a_data.view().into_dimensionality::<Ix1>()?;
            let b_view = b_data.view().into_dimensionality::<Ix1>()?;
            ArrayD::from_elem(IxDyn(&[]), a_view.dot(&b_view))
        }
        // [m, k] @ [k] -> [m]
        (2, 1) => {
            if a.shape()[1] != b.shape()[0] {
                return Err(incompatible("matmul (mat-vec)"));
            }
            let a_view = a_data.view().into_dimensionality::<Ix2>()?;
            let b_view = b_data.view().into_dimensionality::<Ix1>()?;
            a_view.dot(&b_view).into_dyn()
        }
        // [k] @ [k, n] -> [n]
        (1, 2) => {
            if a.shape()[0] != b.shape()[0] {
                return Err(incompatible("matmul (vec-mat)"));
            }
            let a_view = a_data.view().into_dimensionality::<Ix1>()?;
            let b_view = b_data.view().into_dimensionality::<Ix2>()?;
            a_view.dot(&b_view).into_dyn()
        }
        // [m, k] @ [k, n] -> [m, n]
        (2, 2) => {
            if a.shape()[1] != b.shape()[0] {
                return Err(incompatible("matmul (mat-mat)"));
            }
            let a_view = a_data.view().into_dimensionality::<Ix2>()?;
            let b_view = b_data.view().into_dimensionality::<Ix2>()?;
            a_view.dot(&b_view).into_dyn()
        }
        _ => {
            return Err(TensorError::Generic(format!(
                "Matmul not implemented for shapes {:?} and {:?}",
                a.shape(),
                b.shape()
            )))
        }
    };

    Ok(op_result(result_data, &[a, b]))
}

/// Swaps two axes. The result owns a standard-layout copy of the data.
pub fn transpose(a: &Tensor, dim0: usize, dim1: usize) -> Result<Tensor, TensorError> {
    let ndim = a.ndim();
    if dim0 >= ndim || dim1 >= ndim {
        return Err(TensorError::IndexOutOfBounds {
            index: dim0.max(dim1),
            len: ndim,
        });
    }
    let data = a.data()?;
    let mut axes: Vec<usize> = (0..ndim).collect();
    axes.swap(dim0, dim1);
    let permuted = data.view().permuted_axes(axes);
    let result_data = permuted.as_standard_layout().into_owned();
    Ok(op_result(result_data, &[a]))
}

// --- Activation Functions ---

/// Rectified Linear Unit: max(0, x) applied element-wise.
pub fn relu(a: &Tensor) -> Result<Tensor, TensorError> {
    let result_data = a.data()?.mapv(|val| val.max(0.0));
    Ok(op_result(result_data, &[a]))
}

/// Logistic sigmoid: 1 / (1 + exp(-x)).
pub fn sigmoid(a: &Tensor) -> Result<Tensor, TensorError> {
    let result_data = a.data()?.mapv(|val| 1.0 / (1.0 + (-val).exp()));
    Ok(op_result(result_data, &[a]))
}

pub fn tanh(a: &Tensor) -> Result<Tensor, TensorError> {
    let result_data = a.data()?.mapv(TensorData::tanh);
    Ok(op_result(result_data, &[a]))
}

/// Rounds every element half away from zero.
pub fn round(a: &Tensor) -> Result<Tensor, TensorError> {
    let result_data = a.data()?.mapv(TensorData::round);
    Ok(op_result(result_data, &[a]))
}

/// Numerically stable log-softmax of a 2D tensor along axis 1.
pub fn log_softmax(a: &Tensor) -> Result<Tensor, TensorError> {
    if a.ndim() != 2 {
        return Err(TensorError::RankMismatch {
            op: "log_softmax".to_string(),
            expected: 2,
            got: a.ndim(),
        });
    }
    let data = a.data()?;
    let mut result_data = data.to_owned();
    for mut row in result_data.axis_iter_mut(Axis(0)) {
        let max = row.fold(TensorData::NEG_INFINITY, |m, &v| m.max(v));
        let log_sum_exp = row.mapv(|v| (v - max).exp()).sum().ln() + max;
        row.mapv_inplace(|v| v - log_sum_exp);
    }
    Ok(op_result(result_data, &[a]))
}

// --- Reduction Operations ---

/// Sums all elements in the tensor. Returns a 0-dim tensor.
pub fn sum(a: &Tensor) -> Result<Tensor, TensorError> {
    let result_scalar = a.data()?.sum();
    Ok(op_result(ArrayD::from_elem(IxDyn(&[]), result_scalar), &[a]))
}

/// Mean of all elements. Returns a 0-dim tensor.
pub fn mean(a: &Tensor) -> Result<Tensor, TensorError> {
    let data = a.data()?;
    let result_scalar = data
        .mean()
        .ok_or_else(|| TensorError::Empty("mean".to_string()))?;
    Ok(op_result(ArrayD::from_elem(IxDyn(&[]), result_scalar), &[a]))
}

/// Index of the largest element along `axis`, returned as float indices
/// with that axis removed. Ties resolve to the first index.
pub fn argmax_axis(a: &Tensor, axis: usize) -> Result<Tensor, TensorError> {
    if axis >= a.ndim() {
        return Err(TensorError::IndexOutOfBounds {
            index: axis,
            len: a.ndim(),
        });
    }
    if a.shape()[axis] == 0 {
        return Err(TensorError::Empty("argmax_axis".to_string()));
    }
    let data = a.data()?;
    let result_data = data.map_axis(Axis(axis), |lane| {
        let mut best = 0usize;
        for (i, &v) in lane.iter().enumerate() {
            if v > lane[best] {
                best = i;
            }
        }
        best as TensorData
    });
    Ok(Tensor::new(result_data, false))
}

/// Picks `a[i, index[i]]` for every row of a 2D tensor. `index` holds
/// class indices stored as floats; negative, fractional and non-finite
/// values are rejected.
pub fn gather_rows(a: &Tensor, index: &Tensor) -> Result<Tensor, TensorError> {
    if a.ndim() != 2 {
        return Err(TensorError::RankMismatch {
            op: "gather_rows".to_string(),
            expected: 2,
            got: a.ndim(),
        });
    }
    let (rows, cols) = (a.shape()[0], a.shape()[1]);
    if index.size() != rows {
        return Err(TensorError::IncompatibleShapes {
            op: "gather_rows".to_string(),
            shape1: a.shape().to_vec(),
            shape2: index.shape().to_vec(),
        });
    }
    let data = a.data()?;
    let picked = index
        .to_vec()?
        .into_iter()
        .enumerate()
        .map(|(row, class)| {
            if !class.is_finite() || class < 0.0 || class.fract() != 0.0 {
                return Err(TensorError::InvalidIndex(class));
            }
            let class = class as usize;
            if class >= cols {
                return Err(TensorError::IndexOutOfBounds { index: class, len: cols });
            }
            Ok(data[[row, class]])
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(op_result(ArrayD::from_shape_vec(IxDyn(&[rows]), picked)?, &[a]))
}

// --- Shape Manipulation ---

/// Reshapes a tensor to the target shape. The result is a copy.
pub fn reshape(a: &Tensor, new_shape: &[usize]) -> Result<Tensor, TensorError> {
    let new_size: usize = new_shape.iter().product();
    if a.size() != new_size {
        return Err(TensorError::ShapeMismatch {
            expected: vec![a.size()],
            got: vec![new_size],
        });
    }
    let data = a.data()?;
    let result_data = data.to_shape(IxDyn(new_shape))?.into_owned();
    Ok(op_result(result_data, &[a]))
}

/// Inserts an axis of length 1. Negative `axis` counts from the end, so
/// `-1` appends a trailing axis.
pub fn unsqueeze(a: &Tensor, axis: isize) -> Result<Tensor, TensorError> {
    let ndim = a.ndim() as isize;
    let position = if axis < 0 { ndim + 1 + axis } else { axis };
    if position < 0 || position > ndim {
        return Err(TensorError::IndexOutOfBounds {
            index: axis.unsigned_abs(),
            len: a.ndim() + 1,
        });
    }
    let mut new_shape = a.shape().to_vec();
    new_shape.insert(position as usize, 1);
    reshape(a, &new_shape)
}

/// Concatenates tensors along axis 0. All trailing dimensions must agree.
pub fn concat(tensors: &[Tensor]) -> Result<Tensor, TensorError> {
    let first = tensors
        .first()
        .ok_or_else(|| TensorError::Empty("concat".to_string()))?;
    let guards = tensors
        .iter()
        .map(|t| t.data())
        .collect::<Result<Vec<_>, _>>()?;
    let views: Vec<_> = guards.iter().map(|g| g.view()).collect();
    let result_data = ndarray::concatenate(Axis(0), &views).map_err(|_| {
        let mismatched = tensors
            .iter()
            .find(|t| t.shape().get(1..) != first.shape().get(1..))
            .unwrap_or(first);
        TensorError::IncompatibleShapes {
            op: "concat".to_string(),
            shape1: first.shape().to_vec(),
            shape2: mismatched.shape().to_vec(),
        }
    })?;
    let inputs: Vec<&Tensor> = tensors.iter().collect();
    Ok(op_result(result_data, &inputs))
}
