//! Fit-to-cover resizing with anchored cropping.
//!
//! Images are scaled so that they cover the target rectangle, never leaving a
//! letterbox, and are then cropped to exactly the target size. Horizontal crops
//! are always centered; vertical crops follow the [`CropAnchor`].

use crate::core::errors::{PipelineError, PipelineResult};
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vertical placement of the crop window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CropAnchor {
    /// Keep the top of the frame.
    Top,
    /// Keep the vertical center of the frame.
    #[default]
    Center,
}

impl From<String> for CropAnchor {
    /// `"top"` selects [`CropAnchor::Top`]; every other value means center.
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("top") {
            CropAnchor::Top
        } else {
            CropAnchor::Center
        }
    }
}

impl From<CropAnchor> for String {
    fn from(anchor: CropAnchor) -> Self {
        anchor.to_string()
    }
}

impl fmt::Display for CropAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CropAnchor::Top => f.write_str("top"),
            CropAnchor::Center => f.write_str("center"),
        }
    }
}

/// Resizes to cover a fixed target and crops to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitThenCrop {
    pub target_w: u32,
    pub target_h: u32,
    pub anchor: CropAnchor,
}

impl FitThenCrop {
    /// Creates a new resizer.
    ///
    /// # Errors
    ///
    /// Returns an error if either target dimension is zero.
    pub fn new(target_w: u32, target_h: u32, anchor: CropAnchor) -> PipelineResult<Self> {
        if target_w == 0 || target_h == 0 {
            return Err(PipelineError::resize_error(format!(
                "target size must be positive, got {target_w}x{target_h}"
            )));
        }
        Ok(Self {
            target_w,
            target_h,
            anchor,
        })
    }

    /// Applies the resize and crop.
    ///
    /// # Arguments
    ///
    /// * `img` - The input image.
    ///
    /// # Returns
    ///
    /// An image of exactly `target_w x target_h`.
    pub fn apply(&self, img: &RgbImage) -> PipelineResult<RgbImage> {
        fit_then_crop(img, self.target_w, self.target_h, self.anchor)
    }
}

/// Scales `img` to cover `target_w x target_h` with bicubic filtering, then
/// crops to exactly that size.
///
/// The scale is `max(target_w / width, target_h / height)`. Scaled sizes are
/// rounded and never smaller than the target, so crop offsets always lie in
/// `[0, new_dim - target_dim]`.
///
/// # Errors
///
/// Returns an error for an empty input or a zero-sized target.
pub fn fit_then_crop(
    img: &RgbImage,
    target_w: u32,
    target_h: u32,
    anchor: CropAnchor,
) -> PipelineResult<RgbImage> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(PipelineError::resize_error(format!(
            "cannot resize an empty {w}x{h} image"
        )));
    }
    if target_w == 0 || target_h == 0 {
        return Err(PipelineError::resize_error(format!(
            "target size must be positive, got {target_w}x{target_h}"
        )));
    }

    let scale = (target_w as f64 / w as f64).max(target_h as f64 / h as f64);
    let new_w = ((w as f64 * scale).round() as u32).max(target_w);
    let new_h = ((h as f64 * scale).round() as u32).max(target_h);

    let resized = if (new_w, new_h) == (w, h) {
        img.clone()
    } else {
        imageops::resize(img, new_w, new_h, FilterType::CatmullRom)
    };

    let x = (new_w - target_w) / 2;
    let y = match anchor {
        CropAnchor::Top => 0,
        CropAnchor::Center => (new_h - target_h) / 2,
    };

    Ok(imageops::crop_imm(&resized, x, y, target_w, target_h).to_image())
}

/// Keeps a centered window of `ratio` times each side.
///
/// A ratio of `1.0` or more returns the image unchanged.
pub fn center_keep_ratio(img: &RgbImage, ratio: f32) -> RgbImage {
    if ratio >= 1.0 || ratio <= 0.0 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let keep_w = ((w as f32 * ratio).round() as u32).clamp(1, w.max(1));
    let keep_h = ((h as f32 * ratio).round() as u32).clamp(1, h.max(1));
    let x = (w - keep_w) / 2;
    let y = (h - keep_h) / 2;
    imageops::crop_imm(img, x, y, keep_w, keep_h).to_image()
}
