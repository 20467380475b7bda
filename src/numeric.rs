//! Shared numeric helpers for tensor checks and statistics.

use ndarray::{ArrayBase, Data, Dimension};
use num_traits::Float;

use crate::error::{DiffusionError, Result};

/// Returns true if every element is finite.
pub fn all_finite<S, D, F>(arr: &ArrayBase<S, D>) -> bool
where
    S: Data<Elem = F>,
    D: Dimension,
    F: Float,
{
    arr.iter().all(|v| v.is_finite())
}

/// Fails with NUMERIC_ERROR if any element is NaN or infinite.
pub fn ensure_finite<S, D, F>(arr: &ArrayBase<S, D>, what: &str) -> Result<()>
where
    S: Data<Elem = F>,
    D: Dimension,
    F: Float,
{
    if all_finite(arr) {
        Ok(())
    } else {
        Err(DiffusionError::numeric(format!("{} contains non-finite values", what)))
    }
}

/// Mean and population standard deviation, accumulated in f64.
pub fn mean_std<S, D>(arr: &ArrayBase<S, D>) -> (f64, f64)
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let n = arr.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = arr.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let var = arr
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;
    (mean, var.sqrt())
}

/// Mean squared difference between two equally shaped arrays.
pub fn mean_squared_error<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>) -> Result<f32>
where
    S1: Data<Elem = f32>,
    S2: Data<Elem = f32>,
    D: Dimension,
{
    if a.shape() != b.shape() {
        return Err(DiffusionError::shape(format!(
            "cannot compare shapes {:?} and {:?}",
            a.shape(),
            b.shape()
        )));
    }
    let n = a.len().max(1) as f64;
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum();
    Ok((sum / n) as f32)
}
