//! Checkpoint resolution for the `torch` backend.
//!
//! A checkpoint file is either:
//!
//! - a JSON descriptor `{"arch": "...", "state_dict": "weights.safetensors"}`
//!   (`model` is accepted in place of `state_dict`), where the weights path is
//!   relative to the descriptor, or
//! - a complete exported graph, run with ONNX Runtime.

use super::arch::{ProbeArch, ProbeHead};
use super::onnx::OnnxClassifier;
use super::{Classifier, InferenceDevice};
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::{Tensor2D, Tensor4D};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The JSON form of an architecture-plus-weights checkpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckpointDescriptor {
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub state_dict: Option<PathBuf>,
    #[serde(default)]
    pub model: Option<PathBuf>,
}

impl CheckpointDescriptor {
    /// The weights entry, `state_dict` taking precedence over `model`.
    pub fn weights(&self) -> Option<&Path> {
        self.state_dict.as_deref().or(self.model.as_deref())
    }
}

/// A resolved checkpoint.
#[derive(Debug)]
pub enum Checkpoint {
    /// A full serialized model.
    Graph(OnnxClassifier),
    /// An architecture instantiated from a state dict.
    ArchStateDict { arch: ProbeArch, head: ProbeHead },
}

impl Checkpoint {
    /// Loads and resolves a checkpoint.
    ///
    /// # Arguments
    ///
    /// * `path` - The checkpoint file.
    /// * `num_classes` - Classifier output width.
    /// * `device` - Requested device.
    /// * `modality` - Used in error messages.
    pub fn load(
        path: &Path,
        num_classes: usize,
        device: InferenceDevice,
        modality: &str,
    ) -> PipelineResult<Self> {
        if !path.is_file() {
            return Err(PipelineError::model_load(
                modality,
                Some(path),
                "checkpoint not found",
                None,
            ));
        }

        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::model_load(
                modality,
                Some(path),
                "failed to read checkpoint",
                Some(Box::new(e)),
            )
        })?;

        if let Ok(descriptor) = serde_json::from_slice::<CheckpointDescriptor>(&bytes) {
            debug!("{modality} checkpoint is a state-dict descriptor");
            return Self::from_descriptor(path, &descriptor, num_classes, device, modality);
        }

        match OnnxClassifier::load(path, num_classes, device) {
            Ok(graph) => {
                info!("{modality} checkpoint loaded as a full model graph");
                Ok(Checkpoint::Graph(graph))
            }
            Err(e) => Err(PipelineError::model_load(
                modality,
                Some(path),
                "unreadable checkpoint, expected a state-dict descriptor or a model graph",
                Some(Box::new(e)),
            )),
        }
    }

    fn from_descriptor(
        path: &Path,
        descriptor: &CheckpointDescriptor,
        num_classes: usize,
        device: InferenceDevice,
        modality: &str,
    ) -> PipelineResult<Self> {
        let arch_name = descriptor.arch.as_deref().ok_or_else(|| {
            PipelineError::model_load(
                modality,
                Some(path),
                "checkpoint has no 'arch' entry; cannot build the model",
                None,
            )
        })?;
        let arch: ProbeArch = arch_name
            .parse()
            .map_err(|e: String| PipelineError::model_load(modality, Some(path), e, None))?;

        let weights = descriptor.weights().ok_or_else(|| {
            PipelineError::model_load(
                modality,
                Some(path),
                "checkpoint has neither 'state_dict' nor 'model' entry",
                None,
            )
        })?;
        let weights = match path.parent() {
            Some(dir) if weights.is_relative() => dir.join(weights),
            _ => weights.to_path_buf(),
        };
        if !weights.is_file() {
            return Err(PipelineError::model_load(
                modality,
                Some(&weights),
                "state dict not found",
                None,
            ));
        }

        let head = ProbeHead::load(arch, &weights, num_classes, &device.candle_device())
            .map_err(|e| {
                PipelineError::model_load(
                    modality,
                    Some(&weights),
                    "failed to load state dict",
                    Some(Box::new(e)),
                )
            })?;
        info!("{modality} checkpoint loaded as {arch} from a state dict");
        Ok(Checkpoint::ArchStateDict { arch, head })
    }

    /// `graph` or `state_dict`.
    pub fn kind(&self) -> &'static str {
        match self {
            Checkpoint::Graph(_) => "graph",
            Checkpoint::ArchStateDict { .. } => "state_dict",
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Checkpoint::Graph(graph) => graph,
            Checkpoint::ArchStateDict { head, .. } => head,
        }
    }
}

impl Classifier for Checkpoint {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn num_classes(&self) -> usize {
        self.inner().num_classes()
    }

    fn forward(&self, batch: &Tensor4D) -> PipelineResult<Tensor2D> {
        self.inner().forward(batch)
    }
}
