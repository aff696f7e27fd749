//! Per-modality model runtime with lazily initialised caches.
//!
//! Every [`ModelRuntime`] owns three caches (label list, translator, model)
//! that are filled on first use and never replaced. Initialisation goes through
//! `once_cell::sync::OnceCell`, so concurrent first calls build each resource
//! exactly once.

use super::checkpoint::Checkpoint;
use super::dummy::DummyClassifier;
use super::{Backend, Classifier, InferenceDevice};
use crate::core::config::{AppConfig, ModelConfig};
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::Tensor3D;
use crate::domain::{Prediction, RouteDecision};
use crate::processors::{softmax, topk};
use crate::utils::{load_labels, LabelTranslator};
use ndarray::Axis;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// A loaded classifier together with where and how it runs.
#[derive(Debug)]
pub struct ModelHandle {
    pub model: Box<dyn Classifier>,
    pub device: InferenceDevice,
    pub backend: Backend,
}

/// Model, labels and translator of one modality.
#[derive(Debug)]
pub struct ModelRuntime {
    modality: RouteDecision,
    config: ModelConfig,
    labels: OnceCell<Vec<String>>,
    translator: OnceCell<LabelTranslator>,
    handle: OnceCell<ModelHandle>,
}

impl ModelRuntime {
    pub fn new(modality: RouteDecision, config: ModelConfig) -> Self {
        Self {
            modality,
            config,
            labels: OnceCell::new(),
            translator: OnceCell::new(),
            handle: OnceCell::new(),
        }
    }

    pub fn modality(&self) -> RouteDecision {
        self.modality
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// The label list, loaded on first call.
    ///
    /// Fails when the file holds a different number of labels than
    /// `num_classes`.
    pub fn labels(&self) -> PipelineResult<&[String]> {
        self.labels
            .get_or_try_init(|| {
                let labels = load_labels(
                    &self.config.label_path,
                    self.config.num_classes,
                    self.modality.as_str(),
                )?;
                info!("{} labels loaded | count={}", self.modality, labels.len());
                Ok(labels)
            })
            .map(Vec::as_slice)
    }

    /// The translator, loaded on first call. Missing files give an empty one.
    pub fn translator(&self) -> PipelineResult<&LabelTranslator> {
        self.translator.get_or_try_init(|| {
            let translator = LabelTranslator::load(
                self.config.translate_path.as_deref(),
                self.modality.as_str(),
            )?;
            debug!(
                "{} translator loaded | entries={}",
                self.modality,
                translator.len()
            );
            Ok(translator)
        })
    }

    /// The model handle, loaded on first call.
    pub fn handle(&self) -> PipelineResult<&ModelHandle> {
        self.handle.get_or_try_init(|| self.load_model())
    }

    fn load_model(&self) -> PipelineResult<ModelHandle> {
        let backend = Backend::parse(&self.config.backend).ok_or_else(|| {
            PipelineError::BackendNotImplemented {
                backend: self.config.backend.clone(),
                modality: self.modality.to_string(),
            }
        })?;
        let device: InferenceDevice = self.config.device.parse().map_err(|e: String| {
            PipelineError::invalid_config(format!("models.{}.device", self.modality), e)
        })?;
        let device = device.effective();

        let start = Instant::now();
        let model: Box<dyn Classifier> = match backend {
            Backend::Dummy => Box::new(DummyClassifier::new(self.config.num_classes)),
            Backend::Torch => Box::new(Checkpoint::load(
                &self.config.ckpt_path,
                self.config.num_classes,
                device,
                self.modality.as_str(),
            )?),
        };
        info!(
            "{} model ready | backend={} device={} load_ms={}",
            self.modality,
            backend.as_str(),
            device,
            start.elapsed().as_millis()
        );

        Ok(ModelHandle {
            model,
            device,
            backend,
        })
    }

    /// Classifies one `(3, H, W)` tensor.
    ///
    /// Labels are loaded before the model so a label count mismatch surfaces
    /// before any forward pass. `k` is clamped to the number of classes.
    pub fn infer(&self, tensor: &Tensor3D, k: usize) -> PipelineResult<Prediction> {
        let labels = self.labels()?;
        let translator = self.translator()?;
        let handle = self.handle()?;
        let name = handle.model.name();

        let batch = tensor.view().insert_axis(Axis(0)).to_owned();
        let logits = handle.model.forward(&batch)?;
        if logits.dim() != (1, self.config.num_classes) {
            return Err(PipelineError::inference_msg(
                name,
                format!(
                    "expected logits of shape [1, {}], got {:?}",
                    self.config.num_classes,
                    logits.shape()
                ),
            ));
        }

        let row: Vec<f32> = logits.row(0).to_vec();
        let probs = softmax(&row);
        let k = k.min(probs.len()).max(1);
        let ranked = topk(&probs, k).map_err(|e| PipelineError::inference_msg(name, e))?;

        Prediction::from_topk(&ranked, labels, |label| translator.translate(label))
            .ok_or_else(|| PipelineError::inference_msg(name, "empty prediction"))
    }
}

/// The species and disease runtimes, built once per process.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    species: Arc<ModelRuntime>,
    disease: Arc<ModelRuntime>,
}

impl ModelRegistry {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            species: Arc::new(ModelRuntime::new(
                RouteDecision::Species,
                config.models.species.clone(),
            )),
            disease: Arc::new(ModelRuntime::new(
                RouteDecision::Disease,
                config.models.disease.clone(),
            )),
        }
    }

    /// The runtime of a modality.
    pub fn get(&self, modality: RouteDecision) -> &ModelRuntime {
        match modality {
            RouteDecision::Species => &self.species,
            RouteDecision::Disease => &self.disease,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorCategory;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn model_config(dir: &Path, backend: &str, num_classes: usize) -> ModelConfig {
        ModelConfig {
            backend: backend.to_string(),
            ckpt_path: dir.join("model.ckpt"),
            label_path: dir.join("labels.json"),
            num_classes,
            device: "cpu".to_string(),
            translate_path: Some(dir.join("translate.json")),
            topk: None,
        }
    }

    fn write_labels(dir: &Path, labels: &str) {
        std::fs::write(dir.join("labels.json"), labels).unwrap();
    }

    #[test]
    fn test_dummy_inference() {
        let dir = TempDir::new().unwrap();
        write_labels(dir.path(), r#"["early_blight", "healthy", "rust"]"#);
        std::fs::write(
            dir.path().join("translate.json"),
            r#"{"Early Blight": "Sương mai sớm"}"#,
        )
        .unwrap();
        let runtime = ModelRuntime::new(
            RouteDecision::Disease,
            model_config(dir.path(), "dummy", 3),
        );

        let pred = runtime.infer(&Tensor3D::zeros((3, 8, 8)), 10).unwrap();
        assert_eq!(pred.class_id, 0);
        assert_eq!(pred.class_name, "early_blight");
        assert_eq!(pred.class_name_localized, "Sương mai sớm");
        assert_eq!(pred.topk.len(), 3);
        assert!((pred.score - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_label_count_mismatch_fails_before_inference() {
        let dir = TempDir::new().unwrap();
        write_labels(dir.path(), r#"["a", "b"]"#);
        let runtime = ModelRuntime::new(
            RouteDecision::Species,
            model_config(dir.path(), "dummy", 3),
        );
        let err = runtime.infer(&Tensor3D::zeros((3, 4, 4)), 1).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ModelLoad);
        assert!(runtime.handle.get().is_none());
    }

    #[test]
    fn test_unsupported_backend() {
        let dir = TempDir::new().unwrap();
        write_labels(dir.path(), r#"["a"]"#);
        let runtime = ModelRuntime::new(
            RouteDecision::Species,
            model_config(dir.path(), "tflite", 1),
        );
        let err = runtime.handle().unwrap_err();
        assert!(matches!(err, PipelineError::BackendNotImplemented { .. }));
    }

    #[test]
    fn test_missing_checkpoint_is_model_load_error() {
        let dir = TempDir::new().unwrap();
        let runtime = ModelRuntime::new(
            RouteDecision::Disease,
            model_config(dir.path(), "torch", 2),
        );
        let err = runtime.handle().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ModelLoad);
    }

    #[test]
    fn test_missing_translator_passes_through() {
        let dir = TempDir::new().unwrap();
        write_labels(dir.path(), r#"{"1": "rose", "0": "fern"}"#);
        let mut config = model_config(dir.path(), "dummy", 2);
        config.translate_path = Some(PathBuf::from("/nonexistent/translate.json"));
        let runtime = ModelRuntime::new(RouteDecision::Species, config);

        let pred = runtime.infer(&Tensor3D::zeros((3, 2, 2)), 1).unwrap();
        assert_eq!(pred.class_name, "fern");
        assert_eq!(pred.class_name_localized, "fern");
        assert_eq!(pred.topk.len(), 1);
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let dir = TempDir::new().unwrap();
        write_labels(dir.path(), r#"["a", "b"]"#);
        let runtime = ModelRuntime::new(
            RouteDecision::Species,
            model_config(dir.path(), "dummy", 2),
        );

        let handles: Vec<usize> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| s.spawn(|| runtime.handle().unwrap() as *const ModelHandle as usize))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        assert!(handles.windows(2).all(|w| w[0] == w[1]));

        let first = runtime.labels().unwrap().as_ptr();
        assert!(std::ptr::eq(first, runtime.labels().unwrap().as_ptr()));
    }
}
