//! Error types for the routing pipeline.
//!
//! This module defines the errors that can occur while loading configuration,
//! routing an input, loading and preprocessing images, loading models and
//! running inference. Every variant belongs to one [`ErrorCategory`], which is
//! what the CLI and the batch runner report.
//!
//! Segmentation has no variant here: the segmenter degrades to the original
//! image and records a flag instead of raising.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Enum representing the processing steps an error can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Error occurred during tensor conversion.
    TensorOperation,
    /// Error occurred during pixel normalization.
    Normalization,
    /// Error occurred during resizing or cropping.
    Resize,
    /// Error occurred inside the leaf segmenter.
    Segmentation,
    /// Error occurred while turning logits into a prediction.
    PostProcessing,
    /// Error occurred while writing outputs.
    Output,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Resize => write!(f, "resize"),
            ProcessingStage::Segmentation => write!(f, "segmentation"),
            ProcessingStage::PostProcessing => write!(f, "post-processing"),
            ProcessingStage::Output => write!(f, "output"),
        }
    }
}

/// Coarse classification of errors, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid configuration. Fatal at startup.
    Configuration,
    /// No rule, heuristic or default resolved a filename.
    Routing,
    /// The input image is missing or has an unsupported shape.
    ImageLoad,
    /// A checkpoint, label file or backend could not be loaded.
    ModelLoad,
    /// Anything that failed between preprocessing and the final prediction.
    Inference,
    /// Filesystem problems outside the categories above.
    Io,
}

impl ErrorCategory {
    /// Stable snake_case name used in batch summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Routing => "routing",
            ErrorCategory::ImageLoad => "image_load",
            ErrorCategory::ModelLoad => "model_load",
            ErrorCategory::Inference => "inference",
            ErrorCategory::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boxed error source used by variants that wrap foreign errors.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Enum representing the errors that can occur in the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required configuration key is absent.
    #[error("configuration: missing required key '{path}'")]
    MissingConfigKey {
        /// Dotted path of the missing key.
        path: String,
    },

    /// A configuration value is present but invalid.
    #[error("configuration: invalid value at '{path}': {message}")]
    InvalidConfig {
        /// Dotted path of the offending key.
        path: String,
        /// Why the value was rejected.
        message: String,
    },

    /// A configuration problem that is not tied to a single key.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// No routing rule, heuristic or default applied to the input.
    #[error("routing failed for '{filename}': {reason}")]
    Routing {
        /// The file name that could not be routed.
        filename: String,
        /// Why no route could be chosen.
        reason: String,
    },

    /// The input image does not exist.
    #[error("image not found: {}", .path.display())]
    ImageNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The decoded image is not a non-empty H x W x 3 array.
    #[error("unsupported image shape {shape:?} for {}", .path.display())]
    UnsupportedImageShape {
        /// The offending file.
        path: PathBuf,
        /// Shape as (height, width, channels).
        shape: (usize, usize, usize),
    },

    /// The image exists but could not be decoded.
    #[error("failed to decode image {}", .path.display())]
    ImageDecode {
        /// The offending file.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },

    /// A model, label file or checkpoint could not be loaded.
    #[error("{modality} model load failed{}: {message}", display_path_suffix(.path))]
    ModelLoad {
        /// Modality whose runtime failed.
        modality: String,
        /// The file involved, if any.
        path: Option<PathBuf>,
        /// Description of the failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxedSource>,
    },

    /// The configured backend is not available for this modality.
    #[error("backend '{backend}' is not implemented for the {modality} modality")]
    BackendNotImplemented {
        /// The configured backend name.
        backend: String,
        /// The modality requesting it.
        modality: String,
    },

    /// The forward pass or output decoding failed.
    #[error("inference failed for model '{model}': {context}")]
    Inference {
        /// Model name.
        model: String,
        /// Additional context.
        context: String,
        /// The underlying error.
        #[source]
        source: Option<BoxedSource>,
    },

    /// A processing step failed.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Option<BoxedSource>,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor reshaping.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// JSON (de)serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

fn display_path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

/// Convenient result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Returns the reporting category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::MissingConfigKey { .. }
            | PipelineError::InvalidConfig { .. }
            | PipelineError::ConfigError { .. } => ErrorCategory::Configuration,
            PipelineError::Routing { .. } => ErrorCategory::Routing,
            PipelineError::ImageNotFound { .. }
            | PipelineError::UnsupportedImageShape { .. }
            | PipelineError::ImageDecode { .. } => ErrorCategory::ImageLoad,
            PipelineError::ModelLoad { .. } | PipelineError::BackendNotImplemented { .. } => {
                ErrorCategory::ModelLoad
            }
            PipelineError::Inference { .. }
            | PipelineError::Processing { .. }
            | PipelineError::Session(_)
            | PipelineError::Tensor(_) => ErrorCategory::Inference,
            PipelineError::Json(_) | PipelineError::Io(_) => ErrorCategory::Io,
        }
    }

    /// Creates a configuration error not tied to a single key.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates an invalid-value configuration error.
    pub fn invalid_config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a routing error.
    pub fn routing(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Routing {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    /// Creates a model load error.
    ///
    /// # Arguments
    ///
    /// * `modality` - The modality whose runtime failed.
    /// * `path` - The file involved, if any.
    /// * `message` - Description of the failure.
    /// * `source` - Optional underlying error.
    pub fn model_load(
        modality: impl std::fmt::Display,
        path: Option<&Path>,
        message: impl Into<String>,
        source: Option<BoxedSource>,
    ) -> Self {
        Self::ModelLoad {
            modality: modality.to_string(),
            path: path.map(Path::to_path_buf),
            message: message.into(),
            source,
        }
    }

    /// Creates an inference error with an underlying source.
    pub fn inference(
        model: &str,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model: model.to_string(),
            context: context.into(),
            source: Some(Box::new(error)),
        }
    }

    /// Creates an inference error without an underlying source.
    pub fn inference_msg(model: &str, context: impl Into<String>) -> Self {
        Self::Inference {
            model: model.to_string(),
            context: context.into(),
            source: None,
        }
    }

    /// Creates a processing error for the given stage.
    pub fn processing(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Some(Box::new(error)),
        }
    }

    /// Creates a resize error.
    pub fn resize_error(context: impl Into<String>) -> Self {
        Self::Processing {
            kind: ProcessingStage::Resize,
            context: context.into(),
            source: None,
        }
    }

    /// Creates a tensor conversion error.
    pub fn tensor_operation(context: impl Into<String>) -> Self {
        Self::Processing {
            kind: ProcessingStage::TensorOperation,
            context: context.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_names_dotted_path() {
        let err = PipelineError::MissingConfigKey {
            path: "models.species.ckpt_path".to_string(),
        };
        assert!(err.to_string().contains("models.species.ckpt_path"));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_model_load_message_includes_path() {
        let err = PipelineError::model_load(
            "disease",
            Some(Path::new("weights/disease.onnx")),
            "checkpoint not found",
            None,
        );
        let msg = err.to_string();
        assert!(msg.contains("disease"));
        assert!(msg.contains("weights/disease.onnx"));
        assert_eq!(err.category(), ErrorCategory::ModelLoad);
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            PipelineError::routing("x.jpg", "no rule").category(),
            ErrorCategory::Routing
        );
        assert_eq!(
            PipelineError::ImageNotFound {
                path: PathBuf::from("a.jpg")
            }
            .category(),
            ErrorCategory::ImageLoad
        );
        assert_eq!(
            PipelineError::inference_msg("m", "bad output").category(),
            ErrorCategory::Inference
        );
        assert_eq!(ErrorCategory::ImageLoad.as_str(), "image_load");
    }
}
