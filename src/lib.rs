//! # plantroute
//!
//! A routing and preprocessing pipeline for plant photos. Each image is sent
//! either to a species classifier or to a leaf disease classifier, prepared
//! deterministically for that model and, on the disease path, cropped to the
//! leaf by an HSV segmenter that steps aside when it is not confident.
//!
//! ## Features
//!
//! - Rule, keyword and default based routing with a forced override
//! - Fit-to-cover resizing with top or center anchored crops
//! - HSV masking, morphological cleanup and a roundness-gated leaf crop
//! - Lazily loaded, process-wide model runtimes (dummy, ONNX graph, or
//!   architecture plus safetensors state dict)
//! - Label translation and care catalog lookups
//! - Directory batch mode with accuracy from folder names
//!
//! ## Modules
//!
//! * [`core`] - Configuration, validation, errors and logging setup
//! * [`domain`] - Route decisions, predictions and collaborator interfaces
//! * [`models`] - Classifier backends and the model runtime
//! * [`pipeline`] - Routing, stage plans, the router and batch processing
//! * [`processors`] - Image processing: resize, normalize, segment, top-k
//! * [`utils`] - Image I/O and label files
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plantroute::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config_path = ConfigLoader::discover(None)?;
//! let config = ConfigLoader::load_from_file(&config_path)?;
//! let router = Router::new(config)?;
//!
//! let result = router.route(Path::new("photos/img_leaf_0002.jpg"), &RouteOptions::new())?;
//! println!("{} -> {}", result.route, result.prediction.class_name);
//! println!("stages: {:?}", result.meta.stages);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use plantroute::prelude::*;
/// ```
///
/// Brings in the config loader, the router and its results, route decisions
/// and the error types. Lower-level pieces live in their modules.
pub mod prelude {
    pub use crate::core::{AppConfig, ConfigLoader, ConfigValidator, PipelineError, PipelineResult};
    pub use crate::domain::{Prediction, RouteDecision};
    pub use crate::pipeline::{
        choose_route, BatchRunner, BatchSummary, InferenceResult, RouteOptions, Router,
    };
    pub use crate::utils::load_image;
}
