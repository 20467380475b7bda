//! Sample batch files.
//!
//! Batches are stored as pretty JSON: the sampler that produced them, the
//! seed, the `[B, C, H, W]` shape and the row-major pixel data.

use std::fs;
use std::path::Path;

use ndarray::{Array4, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{DiffusionError, Result};
use crate::types::ImageShape;

/// A generated batch with the metadata needed to reproduce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleBatch {
    /// Scheduler name ("ddpm" or "ddim").
    pub sampler: String,
    pub seed: u64,
    pub shape: ImageShape,
    /// Row-major pixel values, `shape.len()` of them.
    pub data: Vec<f32>,
}

impl SampleBatch {
    /// Wraps a sampled tensor.
    pub fn from_array(sampler: impl Into<String>, seed: u64, images: &Array4<f32>) -> Result<Self> {
        let shape = ImageShape::from_dims(images.shape())?;
        Ok(Self {
            sampler: sampler.into(),
            seed,
            shape,
            data: images.iter().copied().collect(),
        })
    }

    /// Rebuilds the tensor, checking the data length against the shape.
    pub fn to_array(&self) -> Result<Array4<f32>> {
        Array4::from_shape_vec(self.shape.dim(), self.data.clone()).map_err(|e| {
            DiffusionError::shape(format!(
                "{} values do not fill shape {}: {}",
                self.data.len(),
                self.shape,
                e
            ))
        })
    }
}

/// Writes a batch as pretty JSON, creating parent directories as needed.
pub fn write_samples(batch: &SampleBatch, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                DiffusionError::io(format!("Failed to create {}", parent.display()), e)
            })?;
        }
    }

    let json = serde_json::to_string_pretty(batch)
        .map_err(|e| DiffusionError::io("Failed to serialize samples", e))?;
    fs::write(path, json)
        .map_err(|e| DiffusionError::io(format!("Failed to write {}", path.display()), e))
}

/// Reads a batch written by [`write_samples`].
pub fn read_samples(path: &Path) -> Result<SampleBatch> {
    let content = fs::read_to_string(path)
        .map_err(|e| DiffusionError::io(format!("Failed to read {}", path.display()), e))?;
    let batch: SampleBatch = serde_json::from_str(&content)
        .map_err(|e| DiffusionError::io(format!("Failed to parse {}", path.display()), e))?;

    if batch.data.len() != batch.shape.len() {
        return Err(DiffusionError::shape(format!(
            "{} holds {} values for shape {}",
            path.display(),
            batch.data.len(),
            batch.shape
        )));
    }
    Ok(batch)
}

/// Rescales each image to `[0, 1]` by its own min and max.
///
/// Constant images map to 0.5.
pub fn normalize_images(images: &Array4<f32>) -> Array4<f32> {
    let mut out = images.clone();
    for mut image in out.axis_iter_mut(Axis(0)) {
        let (lo, hi) = image
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = hi - lo;
        if range > 0.0 {
            image.mapv_inplace(|v| (v - lo) / range);
        } else {
            image.fill(0.5);
        }
    }
    out
}
