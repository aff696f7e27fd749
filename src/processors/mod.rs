//! Image processing stages of the pipeline.
//!
//! # Modules
//!
//! * `geometry` - Polygons and rectangles used for contour analysis
//! * `morphology` - HSV masking and binary morphology
//! * `normalization` - Pixel normalization into channel-first tensors
//! * `preprocess` - Loading, resizing and normalizing input images
//! * `resize` - Fit-to-cover resizing with anchored cropping
//! * `segmentation` - Roundness-gated leaf segmentation
//! * `topk` - Softmax and top-k extraction

pub mod geometry;
pub mod morphology;
mod normalization;
mod preprocess;
mod resize;
pub mod segmentation;
pub mod topk;

pub use geometry::{Point, Polygon, Rect};
pub use normalization::NormalizeImage;
pub use preprocess::{PreprocessedImage, Preprocessor};
pub use resize::{center_keep_ratio, fit_then_crop, CropAnchor, FitThenCrop};
pub use segmentation::{SegmentationOutcome, SegmentationSummary, Segmenter};
pub use topk::{softmax, topk, TopkResult};
