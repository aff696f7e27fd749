//! Leaf isolation for the disease path.
//!
//! The [`Segmenter`] masks foliage colors in HSV space, cleans the mask with
//! closing and opening, keeps the largest external contour and accepts it only
//! if it is round enough. On any failure the caller gets the input image back
//! unchanged, with [`SegmentationOutcome::used_original`] set.

use super::geometry::{Polygon, Rect};
use super::morphology::{self, FOREGROUND};
use crate::core::config::MorphologyConfig;
use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::Serialize;
use tracing::{debug, warn};

/// Background color painted outside the selected leaf.
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Result of one segmentation attempt.
#[derive(Debug, Clone)]
pub struct SegmentationOutcome {
    /// Image handed downstream: the ROI crop, or the untouched input.
    pub image: RgbImage,
    /// The cleaned binary mask (full-frame when color masking found nothing).
    pub mask: GrayImage,
    /// Roundness of the best candidate contour, 0 when there was none.
    pub roundness: f32,
    /// Whether segmentation was attempted at all.
    pub applied: bool,
    /// Whether `image` is the input returned unchanged.
    pub used_original: bool,
    /// Crop rectangle in input coordinates when the ROI was taken.
    pub roi: Option<Rect>,
}

/// Serializable summary of a [`SegmentationOutcome`] for result metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationSummary {
    pub applied: bool,
    pub used_original: bool,
    pub roundness: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<Rect>,
}

impl SegmentationOutcome {
    fn original(img: &RgbImage, mask: GrayImage, roundness: f32, applied: bool) -> Self {
        Self {
            image: img.clone(),
            mask,
            roundness,
            applied,
            used_original: true,
            roi: None,
        }
    }

    pub fn summary(&self) -> SegmentationSummary {
        SegmentationSummary {
            applied: self.applied,
            used_original: self.used_original,
            roundness: self.roundness,
            roi: self.roi,
        }
    }
}

/// HSV-mask based leaf segmenter with a roundness gate.
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: MorphologyConfig,
}

impl Segmenter {
    /// Creates a segmenter from the `morphology` config section.
    pub fn new(config: MorphologyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MorphologyConfig {
        &self.config
    }

    /// Segments `img`.
    ///
    /// Never fails: every problem degrades to returning the input unchanged.
    ///
    /// # Arguments
    ///
    /// * `img` - The preprocessed disease-path image.
    ///
    /// # Returns
    ///
    /// The outcome, whose `image` is either the masked ROI crop or a
    /// byte-identical copy of `img`.
    pub fn process(&self, img: &RgbImage) -> SegmentationOutcome {
        let (w, h) = img.dimensions();
        if !self.config.enable {
            debug!("segmentation disabled by config");
            return SegmentationOutcome::original(img, GrayImage::new(w, h), 0.0, false);
        }
        if w == 0 || h == 0 {
            return SegmentationOutcome::original(img, GrayImage::new(w, h), 0.0, true);
        }

        let raw_mask = morphology::hsv_mask(img, &self.config.hsv_masking.color_ranges);
        if morphology::count_foreground(&raw_mask) == 0 {
            // No foliage color at all: fall back to the full frame, which
            // leaves nothing to isolate.
            warn!("HSV mask is empty, falling back to full-frame mask");
            let full = GrayImage::from_pixel(w, h, Luma([FOREGROUND]));
            let roundness = self
                .best_contour(&full)
                .map(|p| p.roundness())
                .unwrap_or(0.0);
            return SegmentationOutcome::original(img, full, roundness, true);
        }

        let mask = self.clean(&raw_mask);
        let Some(candidate) = self.best_contour(&mask) else {
            warn!("no external contour after morphology, using original image");
            return SegmentationOutcome::original(img, mask, 0.0, true);
        };

        let roundness = candidate.roundness();
        if roundness < self.config.roundness_threshold {
            warn!(
                roundness,
                threshold = self.config.roundness_threshold,
                "candidate region not round enough, using original image"
            );
            return SegmentationOutcome::original(img, mask, roundness, true);
        }

        let Some(bbox) = candidate.bounding_rect() else {
            return SegmentationOutcome::original(img, mask, roundness, true);
        };

        let mut leaf_mask = component_mask(&mask, &candidate);
        if self.config.hsv_masking.smooth_edges.enable {
            leaf_mask =
                morphology::smooth_edges(&leaf_mask, self.config.hsv_masking.smooth_edges.blur_size);
        }
        let masked = apply_mask(img, &leaf_mask);

        let roi = if self.config.roi.enable {
            bbox.pad_clamped(self.config.roi.padding, w, h)
        } else {
            Rect::new(0, 0, w, h)
        };
        let image = if roi.covers(w, h) {
            masked
        } else {
            imageops::crop_imm(&masked, roi.x, roi.y, roi.width, roi.height).to_image()
        };

        debug!(roundness, ?roi, "segmentation applied");
        SegmentationOutcome {
            image,
            mask: leaf_mask,
            roundness,
            applied: true,
            used_original: false,
            roi: Some(roi),
        }
    }

    /// Closing, then opening, then the optional erode and dilate passes.
    fn clean(&self, mask: &GrayImage) -> GrayImage {
        let ops = &self.config.ops;
        let mask = morphology::binarize(mask, 0);
        let mask = morphology::close(&mask, &ops.close);
        let mask = morphology::open(&mask, &ops.open);
        let mask = morphology::erode(&mask, &ops.erode);
        morphology::dilate(&mask, &ops.dilate)
    }

    /// Largest-area external contour of `mask`.
    fn best_contour(&self, mask: &GrayImage) -> Option<Polygon> {
        find_contours::<u32>(mask)
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(Polygon::from_contour)
            .max_by(|a, b| a.area().total_cmp(&b.area()))
    }
}

/// Mask of the connected component the contour was traced around.
fn component_mask(mask: &GrayImage, contour: &Polygon) -> GrayImage {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let Some(seed) = contour.points.first() else {
        return mask.clone();
    };
    let target = labels.get_pixel(seed.x as u32, seed.y as u32)[0];
    if target == 0 {
        return mask.clone();
    }
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if labels.get_pixel(x, y)[0] == target {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Keeps pixels under the mask and paints the rest with the background color.
fn apply_mask(img: &RgbImage, mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        if mask.get_pixel(x, y)[0] > 0 {
            *img.get_pixel(x, y)
        } else {
            BACKGROUND
        }
    })
}
