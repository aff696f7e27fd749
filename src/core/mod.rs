//! The core module of the routing pipeline.
//!
//! This module contains the fundamental components shared by every stage:
//! - Configuration loading and validation
//! - Constants used throughout the pipeline
//! - Error handling
//! - Input validation helpers
//!
//! It also provides re-exports of commonly used types and functions for convenience.

pub mod config;
pub mod constants;
pub mod errors;
pub mod validation;

pub use config::{AppConfig, ConfigLoader, ConfigValidator, LogFormat};
pub use constants::*;
pub use errors::{ErrorCategory, PipelineError, PipelineResult, ProcessingStage};

/// A single channel-first image tensor, `(C, H, W)`.
pub type Tensor3D = ndarray::Array3<f32>;

/// A batched channel-first tensor, `(N, C, H, W)`.
pub type Tensor4D = ndarray::Array4<f32>;

/// A batch of logit or probability rows, `(N, classes)`.
pub type Tensor2D = ndarray::Array2<f32>;

/// Initializes the tracing subscriber for logging.
///
/// `level` is the default filter directive, normally `logging.level` from the
/// config. `RUST_LOG` takes precedence when set. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init_tracing(level: &str, format: LogFormat) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Full => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    if let Err(e) = result {
        tracing::debug!("tracing subscriber already installed: {e}");
    }
}
