//! Pixel normalization and channel-first tensor conversion.
//!
//! Pixels are always rescaled from `[0, 255]` to `[0, 1]`. When mean/std
//! normalization is enabled the rescaled value is further shifted and scaled
//! per channel. Both steps are folded into a single `value * alpha + beta`.

use crate::core::config::NormalizeConfig;
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::Tensor3D;
use image::RgbImage;

const CHANNELS: usize = 3;

/// Normalizes RGB images into CHW float tensors.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: [f32; CHANNELS],
    /// Offset values for each channel (beta = -mean / std)
    pub beta: [f32; CHANNELS],
}

impl NormalizeImage {
    /// Creates a normalizer.
    ///
    /// # Arguments
    ///
    /// * `mean` - Per-channel means, one value or at least three. Extra entries are ignored.
    /// * `std` - Per-channel standard deviations, same length rules as `mean`.
    /// * `enabled` - When false only the `1/255` rescale is applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a vector is empty, has two entries, or if any
    /// standard deviation is not strictly positive.
    pub fn new(mean: &[f32], std: &[f32], enabled: bool) -> PipelineResult<Self> {
        let scale = 1.0 / 255.0;
        if !enabled {
            return Ok(Self {
                alpha: [scale; CHANNELS],
                beta: [0.0; CHANNELS],
            });
        }

        let mean = per_channel(mean, "mean")?;
        let std = per_channel(std, "std")?;

        for (i, &s) in std.iter().enumerate() {
            if s <= 0.0 || !s.is_finite() {
                return Err(PipelineError::invalid_config(
                    format!("preprocess.common.normalize.std[{i}]"),
                    format!("standard deviation must be greater than 0, got {s}"),
                ));
            }
        }

        let mut alpha = [0.0; CHANNELS];
        let mut beta = [0.0; CHANNELS];
        for c in 0..CHANNELS {
            alpha[c] = scale / std[c];
            beta[c] = -mean[c] / std[c];
        }
        Ok(Self { alpha, beta })
    }

    /// Builds a normalizer from the `preprocess.common.normalize` section.
    pub fn from_config(config: &NormalizeConfig) -> PipelineResult<Self> {
        Self::new(&config.mean, &config.std, config.enable)
    }

    /// Normalizes an image into a `(3, H, W)` tensor.
    ///
    /// # Errors
    ///
    /// Fails if the image is empty or the buffer does not match its
    /// dimensions; nothing is reshaped silently.
    pub fn apply(&self, img: &RgbImage) -> PipelineResult<Tensor3D> {
        let (width, height) = img.dimensions();
        let (w, h) = (width as usize, height as usize);
        if w == 0 || h == 0 {
            return Err(PipelineError::tensor_operation(format!(
                "cannot build a tensor from an empty {w}x{h} image"
            )));
        }

        let raw = img.as_raw();
        if raw.len() != h * w * CHANNELS {
            return Err(PipelineError::tensor_operation(format!(
                "pixel buffer holds {} values, expected {}x{}x{}",
                raw.len(),
                h,
                w,
                CHANNELS
            )));
        }

        let plane = h * w;
        let mut result = vec![0.0f32; CHANNELS * plane];
        for (idx, pixel) in raw.chunks_exact(CHANNELS).enumerate() {
            for c in 0..CHANNELS {
                result[c * plane + idx] = pixel[c] as f32 * self.alpha[c] + self.beta[c];
            }
        }

        Ok(Tensor3D::from_shape_vec((CHANNELS, h, w), result)?)
    }
}

fn per_channel(values: &[f32], name: &str) -> PipelineResult<[f32; CHANNELS]> {
    match values.len() {
        1 => Ok([values[0]; CHANNELS]),
        n if n >= CHANNELS => Ok([values[0], values[1], values[2]]),
        n => Err(PipelineError::invalid_config(
            format!("preprocess.common.normalize.{name}"),
            format!("expected 1 value or at least {CHANNELS} values, got {n}"),
        )),
    }
}
