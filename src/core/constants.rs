//! Constants used throughout the pipeline.

/// Default number of top predictions reported per image.
pub const DEFAULT_TOPK: usize = 5;

/// Default ImageNet mean used when a config omits normalization values.
pub const DEFAULT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Default ImageNet standard deviation.
pub const DEFAULT_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Roundness below which a segmented region is rejected.
pub const DEFAULT_ROUNDNESS_THRESHOLD: f32 = 0.3;

/// Padding in pixels added around the leaf bounding box.
pub const DEFAULT_ROI_PADDING: u32 = 10;

/// Upper bound of the OpenCV-style 8-bit hue channel.
pub const HSV_HUE_MAX: u8 = 180;

/// Number of batch images above which files are processed in parallel.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4;

/// Config files probed, in order, when no path is given.
pub const CONFIG_SEARCH_PATHS: [&str; 4] = [
    "config.toml",
    "src/config.toml",
    "config.json",
    "src/config.json",
];

/// Environment variables that override the configured top-k, in priority order.
pub const TOPK_ENV_VARS: [&str; 2] = ["APP_TOPK", "TOPK"];

/// Species-only top-k override, consulted after [`TOPK_ENV_VARS`].
pub const SPECIES_TOPK_ENV: &str = "SPECIES_TOPK";

/// Disease-only top-k override, consulted after [`TOPK_ENV_VARS`].
pub const DISEASE_TOPK_ENV: &str = "DISEASE_TOPK";

/// Name of the batch summary file written to the output directory.
pub const BATCH_SUMMARY_FILE: &str = "batch_summary.json";
