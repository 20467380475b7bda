//! Image batch shape.

use ndarray::Ix4;
use serde::{Deserialize, Serialize};

use crate::error::{DiffusionError, Result};

/// Shape of an image batch, `[batch, channels, height, width]`.
///
/// Images are square; every dimension is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ImageShape {
    /// Creates a validated shape.
    pub fn new(batch: usize, channels: usize, height: usize, width: usize) -> Result<Self> {
        let shape = Self {
            batch,
            channels,
            height,
            width,
        };
        shape.check()?;
        Ok(shape)
    }

    /// Creates a batch of square images of side `size`.
    pub fn square(batch: usize, channels: usize, size: usize) -> Result<Self> {
        Self::new(batch, channels, size, size)
    }

    /// Creates a validated shape from an ndarray dimension slice.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        match dims {
            [b, c, h, w] => Self::new(*b, *c, *h, *w),
            other => Err(DiffusionError::shape(format!(
                "expected a 4-D [B, C, H, W] shape, got {} dimensions",
                other.len()
            ))),
        }
    }

    fn check(&self) -> Result<()> {
        if self.batch == 0 || self.channels == 0 || self.height == 0 || self.width == 0 {
            return Err(DiffusionError::shape(format!(
                "all dimensions must be non-zero, got {}",
                self
            )));
        }
        if self.height != self.width {
            return Err(DiffusionError::shape(format!(
                "images must be square, got {}x{}",
                self.height, self.width
            )));
        }
        Ok(())
    }

    /// Returns the ndarray dimension for this shape.
    pub fn dim(&self) -> Ix4 {
        Ix4(self.batch, self.channels, self.height, self.width)
    }

    /// Number of elements in one image.
    pub fn image_len(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Number of elements in the whole batch.
    pub fn len(&self) -> usize {
        self.batch * self.image_len()
    }

    /// Always false for a validated shape.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_array(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.batch, self.channels, self.height, self.width
        )
    }
}
