//! The routing pipeline.
//!
//! This module decides which classifier an image belongs to, runs the ordered
//! stages of that route and assembles per-image and batch results.

pub mod batch;
mod result;
mod router;
mod routing;
mod stages;

pub use batch::{
    discover_images, ground_truth_label, output_stems, BatchEntry, BatchFailure, BatchRunner,
    BatchSuccess, BatchSummary,
};
pub use result::{InferenceResult, ResultMeta, Timings};
pub use router::{RouteOptions, RouteOutput, Router};
pub use routing::{choose_route, file_stem_lower};
pub use stages::{PipelinePlan, Stage};
