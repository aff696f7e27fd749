//! Small pooled classifier heads built with candle.
//!
//! Both architectures global-average-pool the normalized `(N, 3, H, W)` input
//! to `(N, 3)` and classify the pooled colors:
//!
//! - `linear_probe`: `head.weight [C, 3]`, `head.bias [C]`
//! - `mlp_probe`: `fc1.weight [H, 3]`, `fc1.bias [H]`, ReLU,
//!   `fc2.weight [C, H]`, `fc2.bias [C]`
//!
//! State dicts load non-strictly: tensors that are missing or have the wrong
//! shape are zero-initialised, tensors nobody asked for are ignored. Both cases
//! are logged.

use super::Classifier;
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::{Tensor2D, Tensor4D};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::Linear;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

const IN_FEATURES: usize = 3;
const DEFAULT_HIDDEN: usize = 64;

/// Architectures a state dict can be loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeArch {
    Linear,
    Mlp,
}

impl FromStr for ProbeArch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear_probe" => Ok(ProbeArch::Linear),
            "mlp_probe" => Ok(ProbeArch::Mlp),
            other => Err(format!(
                "unknown architecture '{other}', expected 'linear_probe' or 'mlp_probe'"
            )),
        }
    }
}

impl fmt::Display for ProbeArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeArch::Linear => f.write_str("linear_probe"),
            ProbeArch::Mlp => f.write_str("mlp_probe"),
        }
    }
}

/// Tracks which state-dict entries were consumed.
struct StateDict {
    tensors: HashMap<String, Tensor>,
    used: HashSet<String>,
    missing: Vec<String>,
    device: Device,
}

impl StateDict {
    fn new(tensors: HashMap<String, Tensor>, device: Device) -> Self {
        Self {
            tensors,
            used: HashSet::new(),
            missing: Vec::new(),
            device,
        }
    }

    /// Takes `name` if present with `shape`, otherwise zeros.
    fn take(&mut self, name: &str, shape: &[usize]) -> candle_core::Result<Tensor> {
        if let Some(t) = self.tensors.get(name) {
            self.used.insert(name.to_string());
            if t.dims() == shape {
                return t.to_dtype(DType::F32)?.to_device(&self.device);
            }
            warn!(
                "state dict entry '{name}' has shape {:?}, expected {:?}; zero-initialising",
                t.dims(),
                shape
            );
        }
        self.missing.push(name.to_string());
        Tensor::zeros(shape, DType::F32, &self.device)
    }

    fn dim0(&self, name: &str) -> Option<usize> {
        self.tensors.get(name).and_then(|t| t.dims().first().copied())
    }

    fn report(&self, arch: ProbeArch) {
        let mut unexpected: Vec<&String> = self
            .tensors
            .keys()
            .filter(|k| !self.used.contains(*k))
            .collect();
        unexpected.sort();
        if !self.missing.is_empty() || !unexpected.is_empty() {
            warn!(
                %arch,
                missing = ?self.missing,
                unexpected = ?unexpected,
                "state dict mismatch | missing={} unexpected={}",
                self.missing.len(),
                unexpected.len()
            );
        }
    }
}

enum Layers {
    Linear(Linear),
    Mlp(Linear, Linear),
}

/// A pooled classifier head with loaded weights.
pub struct ProbeHead {
    arch: ProbeArch,
    layers: Layers,
    device: Device,
    num_classes: usize,
}

impl fmt::Debug for ProbeHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeHead")
            .field("arch", &self.arch)
            .field("num_classes", &self.num_classes)
            .finish()
    }
}

impl ProbeHead {
    /// Loads a head from a safetensors state dict.
    ///
    /// # Arguments
    ///
    /// * `arch` - The architecture to instantiate.
    /// * `weights` - The safetensors file.
    /// * `num_classes` - Output width.
    /// * `device` - Candle device the weights live on.
    pub fn load(
        arch: ProbeArch,
        weights: &Path,
        num_classes: usize,
        device: &Device,
    ) -> PipelineResult<Self> {
        let tensors = candle_core::safetensors::load(weights, device).map_err(|e| {
            PipelineError::inference(&arch.to_string(), "failed to read state dict", e)
        })?;
        Self::from_tensors(arch, tensors, num_classes, device)
    }

    /// Builds a head from already loaded tensors.
    pub fn from_tensors(
        arch: ProbeArch,
        tensors: HashMap<String, Tensor>,
        num_classes: usize,
        device: &Device,
    ) -> PipelineResult<Self> {
        let name = arch.to_string();
        let mut state = StateDict::new(tensors, device.clone());
        let layers = Self::build(arch, &mut state, num_classes)
            .map_err(|e| PipelineError::inference(&name, "failed to build layers", e))?;
        state.report(arch);
        info!(%arch, num_classes, "classifier head loaded");

        Ok(Self {
            arch,
            layers,
            device: device.clone(),
            num_classes,
        })
    }

    fn build(
        arch: ProbeArch,
        state: &mut StateDict,
        num_classes: usize,
    ) -> candle_core::Result<Layers> {
        match arch {
            ProbeArch::Linear => {
                let w = state.take("head.weight", &[num_classes, IN_FEATURES])?;
                let b = state.take("head.bias", &[num_classes])?;
                Ok(Layers::Linear(Linear::new(w, Some(b))))
            }
            ProbeArch::Mlp => {
                let hidden = state.dim0("fc1.weight").unwrap_or(DEFAULT_HIDDEN);
                let w1 = state.take("fc1.weight", &[hidden, IN_FEATURES])?;
                let b1 = state.take("fc1.bias", &[hidden])?;
                let w2 = state.take("fc2.weight", &[num_classes, hidden])?;
                let b2 = state.take("fc2.bias", &[num_classes])?;
                Ok(Layers::Mlp(
                    Linear::new(w1, Some(b1)),
                    Linear::new(w2, Some(b2)),
                ))
            }
        }
    }

    pub fn arch(&self) -> ProbeArch {
        self.arch
    }

    fn run(&self, batch: &Tensor4D) -> candle_core::Result<Vec<Vec<f32>>> {
        let shape = batch.shape();
        let data: Vec<f32> = batch.iter().copied().collect();
        let x = Tensor::from_vec(data, (shape[0], shape[1], shape[2], shape[3]), &self.device)?;
        let pooled = x.mean((2, 3))?;
        let logits = match &self.layers {
            Layers::Linear(head) => head.forward(&pooled)?,
            Layers::Mlp(fc1, fc2) => fc2.forward(&fc1.forward(&pooled)?.relu()?)?,
        };
        logits.to_dtype(DType::F32)?.to_vec2::<f32>()
    }
}

impl Classifier for ProbeHead {
    fn name(&self) -> &str {
        match self.arch {
            ProbeArch::Linear => "linear_probe",
            ProbeArch::Mlp => "mlp_probe",
        }
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn forward(&self, batch: &Tensor4D) -> PipelineResult<Tensor2D> {
        if batch.shape()[1] != IN_FEATURES {
            return Err(PipelineError::inference_msg(
                self.name(),
                format!("expected 3 input channels, got shape {:?}", batch.shape()),
            ));
        }
        let rows = self
            .run(batch)
            .map_err(|e| PipelineError::inference(self.name(), "forward pass failed", e))?;
        let n = rows.len();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        Ok(Tensor2D::from_shape_vec((n, self.num_classes), flat)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_arch() {
        assert_eq!("linear_probe".parse::<ProbeArch>(), Ok(ProbeArch::Linear));
        assert_eq!("MLP_PROBE".parse::<ProbeArch>(), Ok(ProbeArch::Mlp));
        assert!("efficientnet_b0".parse::<ProbeArch>().is_err());
    }

    #[test]
    fn test_linear_probe_uses_loaded_weights() {
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        // Class 1 responds to the green channel.
        tensors.insert(
            "head.weight".to_string(),
            Tensor::new(&[[1f32, 0., 0.], [0., 1., 0.]], &device).unwrap(),
        );
        tensors.insert(
            "head.bias".to_string(),
            Tensor::new(&[0f32, 0.], &device).unwrap(),
        );
        let head = ProbeHead::from_tensors(ProbeArch::Linear, tensors, 2, &device).unwrap();

        let mut batch = Tensor4D::zeros((1, 3, 2, 2));
        batch.slice_mut(ndarray::s![0, 1, .., ..]).fill(2.0);
        let logits = head.forward(&batch).unwrap();
        assert_eq!(logits.shape(), &[1, 2]);
        assert!((logits[[0, 1]] - 2.0).abs() < 1e-6);
        assert!(logits[[0, 0]].abs() < 1e-6);
    }

    #[test]
    fn test_missing_and_unexpected_tensors_are_tolerated() {
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert(
            "classifier.extra".to_string(),
            Tensor::zeros(4, DType::F32, &device).unwrap(),
        );
        let head = ProbeHead::from_tensors(ProbeArch::Mlp, tensors, 3, &device).unwrap();
        let logits = head.forward(&Tensor4D::ones((2, 3, 4, 4))).unwrap();
        assert_eq!(logits.shape(), &[2, 3]);
        assert!(logits.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_load_from_safetensors_file() {
        let device = Device::Cpu;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("head.safetensors");
        let mut tensors = HashMap::new();
        tensors.insert(
            "head.weight".to_string(),
            Tensor::ones((4, 3), DType::F32, &device).unwrap(),
        );
        candle_core::safetensors::save(&tensors, &path).unwrap();

        let head = ProbeHead::load(ProbeArch::Linear, &path, 4, &device).unwrap();
        let logits = head.forward(&Tensor4D::ones((1, 3, 2, 2))).unwrap();
        assert!(logits.iter().all(|&v| (v - 3.0).abs() < 1e-6));
    }
}
