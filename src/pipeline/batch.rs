//! Directory-wide batch processing.
//!
//! Every image under the input directory is routed independently. A failure is
//! recorded in the summary and never aborts the run, so
//! `success + failed == total` always holds.

use super::router::{RouteOptions, Router};
use crate::core::config::IoSection;
use crate::core::constants::{BATCH_SUMMARY_FILE, DEFAULT_PARALLEL_THRESHOLD};
use crate::core::errors::{PipelineError, PipelineResult};
use crate::domain::RouteDecision;
use crate::utils::save_png;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A successfully classified image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSuccess {
    pub image: PathBuf,
    pub route: RouteDecision,
    /// Predicted class name.
    pub prediction: String,
    pub confidence: f32,
    /// The written result JSON.
    pub output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
}

/// An image that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub image: PathBuf,
    pub error: String,
    /// Error category, e.g. `routing` or `image_load`.
    pub error_kind: String,
}

/// One entry of [`BatchSummary::results`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Success(BatchSuccess),
    Failure(BatchFailure),
}

impl BatchEntry {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchEntry::Success(_))
    }

    pub fn correct(&self) -> Option<bool> {
        match self {
            BatchEntry::Success(s) => s.correct,
            BatchEntry::Failure(_) => None,
        }
    }
}

/// The document written to `batch_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub results: Vec<BatchEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incorrect: Option<usize>,
}

impl BatchSummary {
    /// Tallies entries. Accuracy fields are set only when at least one entry
    /// carries a ground-truth verdict.
    pub fn from_entries(results: Vec<BatchEntry>) -> Self {
        let total = results.len();
        let success = results.iter().filter(|e| e.is_success()).count();
        let verdicts: Vec<bool> = results.iter().filter_map(BatchEntry::correct).collect();
        let (accuracy, correct, incorrect) = if verdicts.is_empty() {
            (None, None, None)
        } else {
            let correct = verdicts.iter().filter(|&&c| c).count();
            let incorrect = verdicts.len() - correct;
            (
                Some(correct as f64 / verdicts.len() as f64),
                Some(correct),
                Some(incorrect),
            )
        };

        Self {
            total,
            success,
            failed: total - success,
            results,
            accuracy,
            correct,
            incorrect,
        }
    }

    pub fn write_json(&self, path: &Path) -> PipelineResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Finds every file under `dir` with an accepted extension.
///
/// The walk is recursive; the result is sorted and free of duplicates.
pub fn discover_images(dir: &Path, io: &IoSection) -> PipelineResult<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            PipelineError::Io(std::io::Error::other(format!(
                "failed to walk {}: {e}",
                dir.display()
            )))
        })?;
        if entry.file_type().is_file() && io.accepts(entry.path()) {
            images.push(entry.into_path());
        }
    }
    images.sort();
    images.dedup();
    Ok(images)
}

/// Runs a [`Router`] over a directory.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    router: Router,
    options: RouteOptions,
    parallel_threshold: usize,
}

impl BatchRunner {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            options: RouteOptions::default(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Overrides applied to every image. Any preview path is ignored; batch
    /// previews always go next to the result JSON.
    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = RouteOptions {
            preview_path: None,
            ..options
        };
        self
    }

    /// Inputs above this count are processed in parallel.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Processes every image under `input_dir` and writes results to
    /// `out_dir`, including `batch_summary.json`.
    ///
    /// # Errors
    ///
    /// Only directory-level problems fail the call: an unreadable input
    /// directory or an output directory that cannot be created or written.
    pub fn run(&self, input_dir: &Path, out_dir: &Path) -> PipelineResult<BatchSummary> {
        let start = Instant::now();
        std::fs::create_dir_all(out_dir)?;
        let images = discover_images(input_dir, &self.router.config().io)?;
        let inputs: HashSet<PathBuf> = images
            .iter()
            .filter_map(|p| std::fs::canonicalize(p).ok())
            .collect();
        let stems = output_stems(&images);
        let jobs: Vec<(PathBuf, String)> = images.into_iter().zip(stems).collect();

        let use_parallel = jobs.len() > self.parallel_threshold;
        info!(
            "batch over {} | images={} parallel={}",
            input_dir.display(),
            jobs.len(),
            use_parallel
        );

        let process = |(image, stem): (PathBuf, String)| {
            self.process_one(input_dir, out_dir, &inputs, &image, &stem)
        };
        let results: Vec<BatchEntry> = if use_parallel {
            jobs.into_par_iter().map(process).collect()
        } else {
            jobs.into_iter().map(process).collect()
        };

        let summary = BatchSummary::from_entries(results);
        summary.write_json(&out_dir.join(BATCH_SUMMARY_FILE))?;
        info!(
            "batch done | total={} success={} failed={} elapsed_ms={}",
            summary.total,
            summary.success,
            summary.failed,
            start.elapsed().as_millis()
        );
        Ok(summary)
    }

    fn process_one(
        &self,
        input_dir: &Path,
        out_dir: &Path,
        inputs: &HashSet<PathBuf>,
        image: &Path,
        stem: &str,
    ) -> BatchEntry {
        match self.try_process(input_dir, out_dir, inputs, image, stem) {
            Ok(success) => BatchEntry::Success(success),
            Err(e) => {
                warn!("{} failed: {e}", image.display());
                BatchEntry::Failure(BatchFailure {
                    image: image.to_path_buf(),
                    error: e.to_string(),
                    error_kind: e.category().as_str().to_string(),
                })
            }
        }
    }

    fn try_process(
        &self,
        input_dir: &Path,
        out_dir: &Path,
        inputs: &HashSet<PathBuf>,
        image: &Path,
        stem: &str,
    ) -> PipelineResult<BatchSuccess> {
        let output = self.router.route_detailed(image, &self.options)?;
        let mut result = output.result;

        let preview = out_dir.join(format!("{stem}_preprocessed.png"));
        if is_input(inputs, &preview) {
            warn!("not writing preview over input image {}", preview.display());
        } else {
            save_png(&output.model_input, &preview)?;
            result.meta.preview = Some(preview);
        }

        let json_path = out_dir.join(format!("{stem}.json"));
        result.write_json(&json_path)?;

        if let Some(ext) = image.extension() {
            let copy = out_dir.join(format!("{stem}.{}", ext.to_string_lossy()));
            if is_input(inputs, &copy) {
                debug!("{} is an input image; not copying over it", copy.display());
            } else {
                std::fs::copy(image, &copy)?;
            }
        }

        let ground_truth = ground_truth_label(input_dir, image);
        let correct = ground_truth
            .as_ref()
            .map(|gt| gt.to_lowercase() == result.prediction.class_name.to_lowercase());
        debug!(
            "{} -> {} ground_truth={:?}",
            image.display(),
            result.prediction.class_name,
            ground_truth
        );

        Ok(BatchSuccess {
            image: image.to_path_buf(),
            route: result.route,
            prediction: result.prediction.class_name,
            confidence: result.prediction.score,
            output: json_path,
            ground_truth,
            correct,
        })
    }
}

/// The immediate parent directory name, unless the image sits directly in
/// `input_dir`.
pub fn ground_truth_label(input_dir: &Path, image: &Path) -> Option<String> {
    let parent = image.parent()?;
    if parent == input_dir {
        return None;
    }
    parent
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
}

/// Whether `target` resolves to one of the discovered input images. Outputs
/// never overwrite an input.
fn is_input(inputs: &HashSet<PathBuf>, target: &Path) -> bool {
    std::fs::canonicalize(target).is_ok_and(|p| inputs.contains(&p))
}

/// Assigns each image a unique output stem.
///
/// Repeated stems get `_2`, `_3`, ... appended, skipping any name already
/// issued, including real stems that happen to end in such a suffix.
pub fn output_stems(images: &[PathBuf]) -> Vec<String> {
    let mut issued: HashSet<String> = HashSet::new();
    images
        .iter()
        .map(|image| {
            let stem = image
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let mut candidate = stem.clone();
            let mut n = 1;
            while issued.contains(&candidate) {
                n += 1;
                candidate = format!("{stem}_{n}");
            }
            issued.insert(candidate.clone());
            candidate
        })
        .collect()
}
