//! Exported classifier graphs run with ONNX Runtime.

use super::{Classifier, InferenceDevice};
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::{Tensor2D, Tensor4D};
use ndarray::ArrayView2;
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A self-contained classifier graph.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    model_path: PathBuf,
    model_name: String,
    num_classes: usize,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("model_path", &self.model_path)
            .field("num_classes", &self.num_classes)
            .finish()
    }
}

impl OnnxClassifier {
    /// Loads a graph and binds its first input and first output.
    ///
    /// # Arguments
    ///
    /// * `path` - The exported graph.
    /// * `num_classes` - Expected logit width, checked on every forward pass.
    /// * `device` - Requested device; CUDA needs the `cuda` feature.
    pub fn load(path: &Path, num_classes: usize, device: InferenceDevice) -> PipelineResult<Self> {
        let builder = Session::builder()?.with_log_level(LogLevel::Error)?;
        let builder = match device.effective() {
            InferenceDevice::Cpu => builder,
            #[allow(unused_variables)]
            InferenceDevice::Cuda(id) => {
                #[cfg(feature = "cuda")]
                {
                    let provider = ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(id as i32)
                        .build();
                    builder.with_execution_providers([provider])?
                }
                #[cfg(not(feature = "cuda"))]
                {
                    builder
                }
            }
        };
        let session = builder.commit_from_file(path)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| PipelineError::inference_msg("onnx", "graph declares no inputs"))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| PipelineError::inference_msg("onnx", "graph declares no outputs"))?;

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string();

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            model_path: path.to_path_buf(),
            model_name,
            num_classes,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn forward(&self, batch: &Tensor4D) -> PipelineResult<Tensor2D> {
        let batch_size = batch.shape()[0];
        let input_tensor = TensorRef::from_array_view(batch.view()).map_err(|e| {
            PipelineError::inference(
                &self.model_name,
                format!("failed to convert input tensor with shape {:?}", batch.shape()),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let mut session = self.session.lock().map_err(|_| {
            PipelineError::inference_msg(&self.model_name, "session lock poisoned")
        })?;
        let outputs = session.run(inputs).map_err(|e| {
            PipelineError::inference(
                &self.model_name,
                format!(
                    "forward pass failed with input '{}' -> output '{}'",
                    self.input_name, self.output_name
                ),
                e,
            )
        })?;

        let (output_shape, output_data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                PipelineError::inference(
                    &self.model_name,
                    format!("failed to extract output '{}' as f32", self.output_name),
                    e,
                )
            })?;

        let expected_len = batch_size * self.num_classes;
        if output_data.len() != expected_len {
            return Err(PipelineError::inference_msg(
                &self.model_name,
                format!(
                    "output shape {:?} does not hold {} x {} logits",
                    &output_shape[..],
                    batch_size,
                    self.num_classes
                ),
            ));
        }

        let view = ArrayView2::from_shape((batch_size, self.num_classes), output_data)?;
        Ok(view.to_owned())
    }
}
