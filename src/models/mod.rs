//! Classifier backends and the per-modality model runtime.
//!
//! A classifier is opaque to the rest of the pipeline: a `(N, 3, H, W)` tensor
//! goes in, a `(N, classes)` logit matrix comes out. Two backends exist:
//!
//! - `dummy`: all-zero logits, for wiring tests without weights.
//! - `torch`: a checkpoint resolved once into a [`Checkpoint`], either an
//!   exported graph run by ONNX Runtime or an architecture tag plus a
//!   safetensors state dict run with candle.

pub mod arch;
pub mod checkpoint;
pub mod dummy;
pub mod onnx;
pub mod runtime;

pub use arch::{ProbeArch, ProbeHead};
pub use checkpoint::{Checkpoint, CheckpointDescriptor};
pub use dummy::DummyClassifier;
pub use onnx::OnnxClassifier;
pub use runtime::{ModelHandle, ModelRegistry, ModelRuntime};

use crate::core::errors::PipelineResult;
use crate::core::{Tensor2D, Tensor4D};
use std::fmt;
use std::str::FromStr;

/// A loaded classifier.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Width of the logit rows.
    fn num_classes(&self) -> usize;

    /// Runs the forward pass on a batch.
    fn forward(&self, batch: &Tensor4D) -> PipelineResult<Tensor2D>;
}

/// Supported checkpoint backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Dummy,
    Torch,
}

impl Backend {
    /// Parses a configured backend name; `None` for unsupported values.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "dummy" => Some(Backend::Dummy),
            "torch" => Some(Backend::Torch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Dummy => "dummy",
            Backend::Torch => "torch",
        }
    }
}

/// Device a model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceDevice {
    #[default]
    Cpu,
    /// CUDA device ordinal.
    Cuda(usize),
}

impl FromStr for InferenceDevice {
    type Err = String;

    /// Accepts `cpu`, `cuda` (ordinal 0) and `cuda:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(InferenceDevice::Cpu),
            "cuda" | "gpu" => Ok(InferenceDevice::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|n| n.parse().ok())
                .map(InferenceDevice::Cuda)
                .ok_or_else(|| format!("unknown device '{other}', use 'cpu', 'cuda' or 'cuda:N'")),
        }
    }
}

impl fmt::Display for InferenceDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceDevice::Cpu => f.write_str("cpu"),
            InferenceDevice::Cuda(id) => write!(f, "cuda:{id}"),
        }
    }
}

impl InferenceDevice {
    /// The device actually usable in this build.
    ///
    /// CUDA requests fall back to the CPU, with a warning, unless the crate is
    /// compiled with the `cuda` feature.
    pub fn effective(self) -> Self {
        match self {
            InferenceDevice::Cpu => self,
            #[cfg(feature = "cuda")]
            InferenceDevice::Cuda(_) => self,
            #[cfg(not(feature = "cuda"))]
            InferenceDevice::Cuda(id) => {
                tracing::warn!(
                    "cuda:{id} requested but CUDA support not enabled, compile with --features cuda; using cpu"
                );
                InferenceDevice::Cpu
            }
        }
    }

    /// Candle device for this selection.
    pub fn candle_device(self) -> candle_core::Device {
        match self.effective() {
            InferenceDevice::Cpu => candle_core::Device::Cpu,
            #[allow(unused_variables)]
            InferenceDevice::Cuda(id) => {
                #[cfg(feature = "cuda")]
                {
                    match candle_core::Device::new_cuda(id) {
                        Ok(device) => return device,
                        Err(e) => tracing::warn!("failed to create CUDA device {id}: {e}; using cpu"),
                    }
                }
                candle_core::Device::Cpu
            }
        }
    }
}
