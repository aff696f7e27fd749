//! Strongly-typed configuration produced by the validator.
//!
//! The raw configuration file is checked key by key first (see
//! [`super::ConfigValidator`]); only then is it deserialized into
//! [`AppConfig`]. Every component downstream consumes these types instead of
//! the raw mapping.

use crate::core::constants::{
    DEFAULT_ROI_PADDING, DEFAULT_ROUNDNESS_THRESHOLD, DEFAULT_TOPK, DISEASE_TOPK_ENV,
    SPECIES_TOPK_ENV, TOPK_ENV_VARS,
};
use crate::domain::{RouteDecision, RoutingRule};
use crate::processors::CropAnchor;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Root of the validated configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub app: AppSection,
    pub io: IoSection,
    pub logging: LoggingSection,
    pub router: RouterSection,
    pub models: ModelsSection,
    pub preprocess: PreprocessSection,
    #[serde(default)]
    pub morphology: MorphologyConfig,
}

impl AppConfig {
    /// Resolves the top-k for a modality.
    ///
    /// Environment overrides win (`APP_TOPK`, `TOPK`, then `SPECIES_TOPK` or
    /// `DISEASE_TOPK`), then `models.<modality>.topk`, then `app.topk`.
    pub fn topk_for(&self, modality: RouteDecision) -> usize {
        resolve_topk(
            modality,
            |var| std::env::var(var).ok(),
            self.models.get(modality).topk,
            self.app.topk,
        )
    }
}

fn resolve_topk(
    modality: RouteDecision,
    env: impl Fn(&str) -> Option<String>,
    model_topk: Option<usize>,
    app_topk: usize,
) -> usize {
    let modality_var = match modality {
        RouteDecision::Species => SPECIES_TOPK_ENV,
        RouteDecision::Disease => DISEASE_TOPK_ENV,
    };
    let from_env = TOPK_ENV_VARS
        .iter()
        .copied()
        .chain(std::iter::once(modality_var))
        .find_map(|var| {
            env(var)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|&k| k > 0)
        });
    from_env
        .or(model_topk.filter(|&k| k > 0))
        .unwrap_or(app_topk)
        .max(1)
}

/// The `app` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    /// Route used when no rule or filename keyword applies.
    #[serde(deserialize_with = "deserialize_default_route")]
    pub default_route: Option<RouteDecision>,
    /// Skip the segmenter on the disease path unless overridden per call.
    pub skip_morphology: bool,
    #[serde(default = "default_topk")]
    pub topk: usize,
}

/// The `io` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoSection {
    /// Accepted file extensions, with or without the leading dot.
    pub input_extensions: Vec<String>,
    /// Directory receiving result JSON files.
    pub outputs_dir: PathBuf,
    /// Persist the resized, pre-normalization image next to each result.
    #[serde(default)]
    pub save_preview: bool,
    /// Canonicalize input paths before routing.
    #[serde(default = "default_true")]
    pub resolve_symlink: bool,
    /// Optional JSON file with plant care records.
    #[serde(default)]
    pub care_catalog: Option<PathBuf>,
}

impl IoSection {
    /// Returns true if `path` has one of the configured extensions.
    ///
    /// An empty extension list accepts everything.
    pub fn accepts(&self, path: &Path) -> bool {
        if self.input_extensions.is_empty() {
            return true;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.input_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').to_ascii_lowercase() == ext)
    }
}

/// Output style of the log formatter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
}

/// The `logging` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Default filter directive, e.g. `info` or `plantroute=debug`.
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

/// The `router` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterSection {
    /// Ordered rules; the first match wins.
    pub rules: Vec<RoutingRule>,
}

/// The `models` section, one entry per modality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsSection {
    pub species: ModelConfig,
    pub disease: ModelConfig,
}

impl ModelsSection {
    /// Returns the model config of a modality.
    pub fn get(&self, modality: RouteDecision) -> &ModelConfig {
        match modality {
            RouteDecision::Species => &self.species,
            RouteDecision::Disease => &self.disease,
        }
    }
}

/// Model settings of a single modality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `dummy` or `torch`.
    pub backend: String,
    pub ckpt_path: PathBuf,
    pub label_path: PathBuf,
    pub num_classes: usize,
    /// `cpu`, `cuda` or `cuda:N`.
    pub device: String,
    /// Optional JSON map of English label to localized label.
    #[serde(default)]
    pub translate_path: Option<PathBuf>,
    #[serde(default)]
    pub topk: Option<usize>,
}

/// The `preprocess` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessSection {
    pub common: CommonPreprocess,
    pub species: ModePreprocess,
    pub disease: ModePreprocess,
}

impl PreprocessSection {
    /// Returns the mode-specific section.
    pub fn mode(&self, modality: RouteDecision) -> &ModePreprocess {
        match modality {
            RouteDecision::Species => &self.species,
            RouteDecision::Disease => &self.disease,
        }
    }
}

/// Settings shared by both preprocessing modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonPreprocess {
    /// Target `[width, height]`; zero in either slot disables resizing.
    pub img_size: [u32; 2],
    pub to_rgb: bool,
    /// Fraction of each side kept by a centered pre-crop, in `(0, 1]`.
    #[serde(default = "default_keep_ratio")]
    pub keep_ratio: f32,
    pub normalize: NormalizeConfig,
}

impl CommonPreprocess {
    /// Returns the target `(width, height)` or `None` when resizing is off.
    pub fn target_size(&self) -> Option<(u32, u32)> {
        let [w, h] = self.img_size;
        (w > 0 && h > 0).then_some((w, h))
    }
}

/// Mean/std normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    pub enable: bool,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

/// Mode-specific preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModePreprocess {
    pub enable: bool,
    pub extra: ModeExtra,
}

impl ModePreprocess {
    /// Anchor in effect; a disabled mode falls back to a centered crop.
    pub fn anchor(&self) -> CropAnchor {
        if self.enable {
            self.extra.anchor
        } else {
            CropAnchor::Center
        }
    }
}

/// Extra per-mode knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeExtra {
    pub anchor: CropAnchor,
}

/// An inclusive HSV range in OpenCV 8-bit units (H 0..180, S/V 0..255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Returns true if the HSV triple lies inside the range on every channel.
    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

/// Shape of a morphological structuring element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuringShape {
    #[default]
    Ellipse,
    Rect,
    Cross,
}

/// One morphological operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorphOpConfig {
    pub enable: bool,
    /// Kernel size `[width, height]`.
    #[serde(default = "default_ksize")]
    pub ksize: [u32; 2],
    #[serde(default = "default_iter")]
    pub iter: u32,
    #[serde(default)]
    pub shape: StructuringShape,
}

impl MorphOpConfig {
    fn enabled(ksize: u32, iter: u32) -> Self {
        Self {
            enable: true,
            ksize: [ksize, ksize],
            iter,
            shape: StructuringShape::Ellipse,
        }
    }

    fn disabled() -> Self {
        Self {
            enable: false,
            ..Self::enabled(3, 1)
        }
    }
}

/// The ordered morphological cleanup passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorphOpsConfig {
    #[serde(default = "default_close")]
    pub close: MorphOpConfig,
    #[serde(default = "default_open")]
    pub open: MorphOpConfig,
    #[serde(default = "MorphOpConfig::disabled")]
    pub erode: MorphOpConfig,
    #[serde(default = "MorphOpConfig::disabled")]
    pub dilate: MorphOpConfig,
}

impl Default for MorphOpsConfig {
    fn default() -> Self {
        Self {
            close: default_close(),
            open: default_open(),
            erode: MorphOpConfig::disabled(),
            dilate: MorphOpConfig::disabled(),
        }
    }
}

/// Blur-and-rethreshold pass applied to the final mask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothEdgesConfig {
    pub enable: bool,
    #[serde(default = "default_blur_size")]
    pub blur_size: u32,
}

impl Default for SmoothEdgesConfig {
    fn default() -> Self {
        Self {
            enable: false,
            blur_size: default_blur_size(),
        }
    }
}

/// Color masking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HsvMaskingConfig {
    #[serde(default = "default_color_ranges")]
    pub color_ranges: Vec<HsvRange>,
    #[serde(default)]
    pub smooth_edges: SmoothEdgesConfig,
}

impl Default for HsvMaskingConfig {
    fn default() -> Self {
        Self {
            color_ranges: default_color_ranges(),
            smooth_edges: SmoothEdgesConfig::default(),
        }
    }
}

/// Bounding-box crop around the selected leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiConfig {
    pub enable: bool,
    #[serde(default = "default_padding")]
    pub padding: u32,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            enable: true,
            padding: default_padding(),
        }
    }
}

/// The `morphology` section driving the leaf segmenter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorphologyConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default = "default_roundness_threshold")]
    pub roundness_threshold: f32,
    #[serde(default)]
    pub hsv_masking: HsvMaskingConfig,
    #[serde(default)]
    pub ops: MorphOpsConfig,
    #[serde(default)]
    pub roi: RoiConfig,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            enable: true,
            roundness_threshold: DEFAULT_ROUNDNESS_THRESHOLD,
            hsv_masking: HsvMaskingConfig::default(),
            ops: MorphOpsConfig::default(),
            roi: RoiConfig::default(),
        }
    }
}

/// Green, yellow and red/brown foliage.
pub fn default_color_ranges() -> Vec<HsvRange> {
    vec![
        HsvRange::new([25, 20, 20], [90, 255, 255]),
        HsvRange::new([10, 20, 20], [25, 255, 255]),
        HsvRange::new([0, 20, 20], [10, 255, 255]),
    ]
}

fn deserialize_default_route<'de, D>(deserializer: D) -> Result<Option<RouteDecision>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("null") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn default_topk() -> usize {
    DEFAULT_TOPK
}

fn default_true() -> bool {
    true
}

fn default_keep_ratio() -> f32 {
    1.0
}

fn default_ksize() -> [u32; 2] {
    [3, 3]
}

fn default_iter() -> u32 {
    1
}

fn default_close() -> MorphOpConfig {
    MorphOpConfig::enabled(5, 2)
}

fn default_open() -> MorphOpConfig {
    MorphOpConfig::enabled(3, 1)
}

fn default_blur_size() -> u32 {
    5
}

fn default_padding() -> u32 {
    DEFAULT_ROI_PADDING
}

fn default_roundness_threshold() -> f32 {
    DEFAULT_ROUNDNESS_THRESHOLD
}
