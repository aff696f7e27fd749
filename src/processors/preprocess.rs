//! Deterministic image preparation for both classifier modes.

use super::normalization::NormalizeImage;
use super::resize::{center_keep_ratio, fit_then_crop, CropAnchor};
use crate::core::config::CommonPreprocess;
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::Tensor3D;
use crate::utils::load_image;
use image::RgbImage;
use std::path::Path;

/// A model-ready tensor together with the image it was built from.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// `(3, H, W)` normalized tensor.
    pub tensor: Tensor3D,
    /// The resized image before normalization, used for previews.
    pub resized: RgbImage,
}

/// Loads, resizes and normalizes images.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    common: CommonPreprocess,
    normalizer: NormalizeImage,
}

impl Preprocessor {
    /// Creates a preprocessor from the `preprocess.common` section.
    pub fn new(common: &CommonPreprocess) -> PipelineResult<Self> {
        Ok(Self {
            normalizer: NormalizeImage::from_config(&common.normalize)?,
            common: common.clone(),
        })
    }

    /// Target `(width, height)`, or `None` when geometry is disabled.
    pub fn target_size(&self) -> Option<(u32, u32)> {
        self.common.target_size()
    }

    /// Loads an image as upright RGB.
    pub fn load(&self, path: &Path) -> PipelineResult<RgbImage> {
        load_image(path, self.common.to_rgb)
    }

    /// Applies the centered keep-ratio crop and then [`fit_then_crop`].
    ///
    /// With an `img_size` of zero the image is returned unchanged.
    pub fn transform(&self, img: &RgbImage, anchor: CropAnchor) -> PipelineResult<RgbImage> {
        let Some((tw, th)) = self.target_size() else {
            return Ok(img.clone());
        };
        let cropped = center_keep_ratio(img, self.common.keep_ratio);
        fit_then_crop(&cropped, tw, th, anchor)
    }

    /// Builds the channel-first tensor of an already resized image.
    ///
    /// # Errors
    ///
    /// Fails if the tensor does not have the configured spatial size.
    pub fn normalize(&self, img: &RgbImage) -> PipelineResult<Tensor3D> {
        let tensor = self.normalizer.apply(img)?;
        if let Some((tw, th)) = self.target_size() {
            let expected = [3, th as usize, tw as usize];
            if tensor.shape() != expected {
                return Err(PipelineError::tensor_operation(format!(
                    "tensor shape {:?} does not match target {:?}",
                    tensor.shape(),
                    expected
                )));
            }
        }
        Ok(tensor)
    }

    /// Transforms and normalizes an image in one go.
    pub fn prepare(&self, img: &RgbImage, anchor: CropAnchor) -> PipelineResult<PreprocessedImage> {
        let resized = self.transform(img, anchor)?;
        let tensor = self.normalize(&resized)?;
        Ok(PreprocessedImage { tensor, resized })
    }
}
