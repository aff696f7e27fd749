//! The routing orchestrator.
//!
//! [`Router::route`] resolves the pipeline for a file, builds the stage plan
//! and runs it: image preparation, optional leaf segmentation, inference. The
//! router owns the model registry, so every call made through one router (or
//! its clones) shares the same lazily loaded models.

use super::result::{InferenceResult, ResultMeta, Timings};
use super::routing::choose_route;
use super::stages::{PipelinePlan, Stage};
use crate::core::config::AppConfig;
use crate::core::errors::{PipelineError, PipelineResult};
use crate::domain::{
    CareCatalog, DiagnosisRecord, DiagnosisSink, JsonCareCatalog, Prediction, RouteDecision,
};
use crate::models::ModelRegistry;
use crate::processors::{fit_then_crop, Preprocessor, SegmentationSummary, Segmenter};
use crate::utils::save_png;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-call overrides of [`Router::route`].
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    /// Skip segmentation on the disease path; `None` uses
    /// `app.skip_morphology`.
    pub skip_morph: Option<bool>,
    /// Route to use regardless of the file name.
    pub force: Option<RouteDecision>,
    /// Where to write the image fed to the normalizer.
    pub preview_path: Option<PathBuf>,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_morph(mut self, skip: bool) -> Self {
        self.skip_morph = Some(skip);
        self
    }

    pub fn force(mut self, route: RouteDecision) -> Self {
        self.force = Some(route);
        self
    }

    pub fn preview_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.preview_path = Some(path.into());
        self
    }
}

/// A result together with the image the model saw.
#[derive(Debug, Clone)]
pub struct RouteOutput {
    pub result: InferenceResult,
    pub model_input: RgbImage,
}

/// Working state threaded through the stages of one call.
#[derive(Default)]
struct StageState {
    image: Option<RgbImage>,
    segmentation: Option<SegmentationSummary>,
    prediction: Option<Prediction>,
}

/// Routes images to the species or disease pipeline.
#[derive(Clone)]
pub struct Router {
    config: Arc<AppConfig>,
    registry: ModelRegistry,
    preprocessor: Preprocessor,
    segmenter: Segmenter,
    care_catalog: Option<Arc<dyn CareCatalog>>,
    diagnosis_sink: Option<Arc<dyn DiagnosisSink>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("registry", &self.registry)
            .field("care_catalog", &self.care_catalog.is_some())
            .field("diagnosis_sink", &self.diagnosis_sink.is_some())
            .finish()
    }
}

impl Router {
    /// Builds a router and its model registry from a validated config.
    ///
    /// Models are not loaded here; each runtime loads on first use. A
    /// configured `io.care_catalog` file is loaded immediately.
    pub fn new(config: AppConfig) -> PipelineResult<Self> {
        let registry = ModelRegistry::from_config(&config);
        Self::with_registry(config, registry)
    }

    /// Builds a router around an existing registry.
    pub fn with_registry(config: AppConfig, registry: ModelRegistry) -> PipelineResult<Self> {
        let preprocessor = Preprocessor::new(&config.preprocess.common)?;
        let segmenter = Segmenter::new(config.morphology.clone());
        let care_catalog: Option<Arc<dyn CareCatalog>> = match &config.io.care_catalog {
            Some(path) => {
                let catalog = JsonCareCatalog::load(path)?;
                info!("care catalog loaded | records={}", catalog.len());
                Some(Arc::new(catalog))
            }
            None => None,
        };

        Ok(Self {
            config: Arc::new(config),
            registry,
            preprocessor,
            segmenter,
            care_catalog,
            diagnosis_sink: None,
        })
    }

    pub fn with_care_catalog(mut self, catalog: Arc<dyn CareCatalog>) -> Self {
        self.care_catalog = Some(catalog);
        self
    }

    pub fn with_diagnosis_sink(mut self, sink: Arc<dyn DiagnosisSink>) -> Self {
        self.diagnosis_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Applies [`choose_route`] with the configured rules and default.
    pub fn choose(&self, path: &Path, force: Option<RouteDecision>) -> PipelineResult<RouteDecision> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        choose_route(
            &filename,
            &self.config.router.rules,
            force,
            self.config.app.default_route,
        )
    }

    /// Routes and classifies one image.
    pub fn route(&self, path: &Path, options: &RouteOptions) -> PipelineResult<InferenceResult> {
        self.route_detailed(path, options).map(|out| out.result)
    }

    /// Like [`Router::route`], also returning the image fed to the model.
    pub fn route_detailed(&self, path: &Path, options: &RouteOptions) -> PipelineResult<RouteOutput> {
        let start = Instant::now();
        let path = self.resolve_input(path)?;
        if !self.config.io.accepts(&path) {
            warn!(
                "{} does not have a configured input extension {:?}; processing anyway",
                path.display(),
                self.config.io.input_extensions
            );
        }

        let route = self.choose(&path, options.force)?;
        let skip_morph = options
            .skip_morph
            .unwrap_or(self.config.app.skip_morphology);
        let plan = PipelinePlan::build(route, skip_morph);
        info!(
            "routing {} | route={} stages={:?}",
            path.display(),
            route,
            plan.labels()
        );

        let mut state = StageState::default();
        let mut meta = ResultMeta {
            source: Some(path.clone()),
            ..Default::default()
        };
        let mut timing_ms = Timings::default();

        for stage in plan.stages() {
            let stage_start = Instant::now();
            self.run_stage(*stage, &path, &mut state)?;
            let elapsed = stage_start.elapsed().as_millis() as u64;
            timing_ms.record(stage.timing_key(), elapsed);
            meta.stages.push(stage.label());
            debug!("stage {stage} done in {elapsed} ms");
        }

        let (Some(model_input), Some(prediction)) = (state.image, state.prediction) else {
            return Err(PipelineError::inference_msg(
                route.as_str(),
                "plan finished without a prediction",
            ));
        };
        meta.segmentation = state.segmentation;

        if let Some(preview) = &options.preview_path {
            save_png(&model_input, preview)?;
            meta.preview = Some(preview.clone());
        }

        let care = match route {
            RouteDecision::Species => self.lookup_care(&prediction),
            RouteDecision::Disease => {
                self.record_diagnosis(&path, &prediction);
                None
            }
        };

        timing_ms.total = start.elapsed().as_millis() as u64;
        info!(
            "{} -> {} ({:.3}) in {} ms",
            path.display(),
            prediction.class_name,
            prediction.score,
            timing_ms.total
        );

        Ok(RouteOutput {
            result: InferenceResult {
                route,
                prediction,
                meta,
                timing_ms,
                care,
            },
            model_input,
        })
    }

    fn resolve_input(&self, path: &Path) -> PipelineResult<PathBuf> {
        if !path.exists() {
            return Err(PipelineError::ImageNotFound {
                path: path.to_path_buf(),
            });
        }
        if self.config.io.resolve_symlink {
            Ok(std::fs::canonicalize(path)?)
        } else {
            Ok(path.to_path_buf())
        }
    }

    fn run_stage(&self, stage: Stage, path: &Path, state: &mut StageState) -> PipelineResult<()> {
        match stage {
            Stage::Image(mode) => {
                let anchor = self.config.preprocess.mode(mode).anchor();
                let loaded = self.preprocessor.load(path)?;
                state.image = Some(self.preprocessor.transform(&loaded, anchor)?);
            }
            Stage::Morphology => {
                let image = Self::take_image(state, stage)?;
                let outcome = self.segmenter.process(&image);
                if outcome.used_original {
                    warn!(
                        "segmentation fell back to the original image | roundness={:.3}",
                        outcome.roundness
                    );
                }
                state.segmentation = Some(outcome.summary());
                let segmented = match self.preprocessor.target_size() {
                    Some((tw, th)) if outcome.image.dimensions() != (tw, th) => {
                        let anchor = self
                            .config
                            .preprocess
                            .mode(RouteDecision::Disease)
                            .anchor();
                        fit_then_crop(&outcome.image, tw, th, anchor)?
                    }
                    _ => outcome.image,
                };
                state.image = Some(segmented);
            }
            Stage::Model(modality) => {
                let image = state
                    .image
                    .as_ref()
                    .ok_or_else(|| Self::missing_image(stage))?;
                let tensor = self.preprocessor.normalize(image)?;
                let topk = self.config.topk_for(modality);
                state.prediction = Some(self.registry.get(modality).infer(&tensor, topk)?);
            }
        }
        Ok(())
    }

    fn take_image(state: &mut StageState, stage: Stage) -> PipelineResult<RgbImage> {
        state.image.take().ok_or_else(|| Self::missing_image(stage))
    }

    fn missing_image(stage: Stage) -> PipelineError {
        PipelineError::inference_msg(&stage.label(), "no image available for this stage")
    }

    fn lookup_care(&self, prediction: &Prediction) -> Option<serde_json::Value> {
        let catalog = self.care_catalog.as_ref()?;
        let record = catalog
            .find_by_label(&prediction.class_name)
            .or_else(|| catalog.find_by_label(&prediction.class_name_localized));
        if record.is_none() {
            debug!("no care record for '{}'", prediction.class_name);
        }
        record
    }

    fn record_diagnosis(&self, path: &Path, prediction: &Prediction) {
        let Some(sink) = &self.diagnosis_sink else {
            return;
        };
        let record = DiagnosisRecord {
            image: path.to_path_buf(),
            prediction: prediction.clone(),
        };
        if let Err(e) = sink.save(&record) {
            warn!("failed to persist diagnosis for {}: {e}", path.display());
        }
    }
}
