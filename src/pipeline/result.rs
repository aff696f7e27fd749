//! Per-image result documents.

use crate::core::errors::PipelineResult;
use crate::domain::{Prediction, RouteDecision};
use crate::processors::SegmentationSummary;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Wall-clock milliseconds, in total and per stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timings {
    pub total: u64,
    #[serde(flatten)]
    pub stages: BTreeMap<String, u64>,
}

impl Timings {
    pub fn record(&mut self, key: &str, ms: u64) {
        *self.stages.entry(key.to_string()).or_default() += ms;
    }
}

/// Provenance of a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultMeta {
    /// Stages the image actually went through, in order.
    pub stages: Vec<String>,
    /// The resolved input path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<SegmentationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PathBuf>,
}

/// The outcome of routing and classifying one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    pub route: RouteDecision,
    pub prediction: Prediction,
    pub meta: ResultMeta,
    pub timing_ms: Timings,
    /// Care record of the predicted species, when a catalog is wired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub care: Option<Value>,
}

impl InferenceResult {
    /// Whether the segmenter ran and handed its crop downstream.
    pub fn used_segmentation(&self) -> bool {
        self.meta
            .segmentation
            .as_ref()
            .is_some_and(|s| s.applied && !s.used_original)
    }

    pub fn to_json_pretty(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the result as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TopkEntry;

    fn sample() -> InferenceResult {
        let mut timing_ms = Timings {
            total: 12,
            ..Default::default()
        };
        timing_ms.record("image", 4);
        timing_ms.record("model", 8);
        InferenceResult {
            route: RouteDecision::Species,
            prediction: Prediction {
                class_id: 2,
                class_name: "fern".into(),
                class_name_localized: "fern".into(),
                score: 0.5,
                topk: vec![TopkEntry {
                    class_id: 2,
                    class_name: "fern".into(),
                    score: 0.5,
                }],
            },
            meta: ResultMeta {
                stages: vec!["image".into(), "model:species".into()],
                ..Default::default()
            },
            timing_ms,
            care: None,
        }
    }

    #[test]
    fn test_json_shape() {
        let value: Value = serde_json::from_str(&sample().to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["route"], "species");
        assert_eq!(value["prediction"]["class_id"], 2);
        assert_eq!(value["prediction"]["topk"][0]["class_name"], "fern");
        assert_eq!(value["meta"]["stages"][1], "model:species");
        assert_eq!(value["timing_ms"]["total"], 12);
        assert_eq!(value["timing_ms"]["model"], 8);
        assert!(value.get("care").is_none());
        assert!(value["meta"].get("segmentation").is_none());
    }

    #[test]
    fn test_write_json_creates_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/out/result.json");
        sample().write_json(&path).unwrap();
        assert!(path.is_file());
        assert!(!sample().used_segmentation());
    }
}
