//! Class label lists and label translation.
//!
//! Label files are JSON, either an array of names (index = class id) or an
//! object keyed by stringified class ids. Translator files are JSON objects
//! mapping English labels to localized names.

use crate::core::errors::{PipelineError, PipelineResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

static SEPARATOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\s_\-]+").unwrap_or_else(|e| panic!("Failed to compile regex pattern: {e}"))
});

/// Normalizes a label for lookups: trimmed, lowercased, with whitespace,
/// underscores and hyphens removed.
///
/// ```
/// use plantroute::utils::normalize_label;
///
/// assert_eq!(normalize_label(" Tomato___Early-blight "), "tomatoearlyblight");
/// ```
pub fn normalize_label(label: &str) -> String {
    SEPARATOR_REGEX
        .replace_all(&label.trim().to_lowercase(), "")
        .into_owned()
}

/// Loads the ordered class names of a model.
///
/// # Arguments
///
/// * `path` - JSON label file.
/// * `expected_count` - The configured `num_classes`.
/// * `modality` - Modality name used in error messages.
///
/// # Errors
///
/// Fails when the file is missing or malformed, when object keys are not
/// integers, and when the number of labels differs from `expected_count`.
pub fn load_labels(
    path: &Path,
    expected_count: usize,
    modality: &str,
) -> PipelineResult<Vec<String>> {
    let fail = |message: String| PipelineError::model_load(modality, Some(path), message, None);

    if !path.is_file() {
        return Err(fail("label file not found".to_string()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::model_load(
            modality,
            Some(path),
            "failed to read label file",
            Some(Box::new(e)),
        )
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        PipelineError::model_load(
            modality,
            Some(path),
            "label file is not valid JSON",
            Some(Box::new(e)),
        )
    })?;

    let labels = match value {
        Value::Array(items) => items.iter().map(value_to_label).collect::<Vec<_>>(),
        Value::Object(map) => {
            let mut entries = map
                .iter()
                .map(|(k, v)| {
                    k.trim()
                        .parse::<i64>()
                        .map(|id| (id, value_to_label(v)))
                        .map_err(|_| fail(format!("label key '{k}' is not an integer class id")))
                })
                .collect::<PipelineResult<Vec<_>>>()?;
            entries.sort_by_key(|(id, _)| *id);
            entries.into_iter().map(|(_, name)| name).collect()
        }
        _ => {
            return Err(fail(
                "label file must be a JSON array or an object keyed by class id".to_string(),
            ));
        }
    };

    if labels.len() != expected_count {
        return Err(fail(format!(
            "num_classes is {expected_count} but the label file has {} entries",
            labels.len()
        )));
    }
    Ok(labels)
}

fn value_to_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Maps English labels to localized names.
///
/// Lookups go through [`normalize_label`], so `"Early Blight"` and
/// `"early_blight"` share one entry. Unknown labels pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct LabelTranslator {
    map: HashMap<String, String>,
}

impl LabelTranslator {
    /// A translator that passes every label through.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a translator from raw `label -> localized` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (normalize_label(k.as_ref()), v.into()))
            .collect();
        Self { map }
    }

    /// Loads a translator file.
    ///
    /// A missing path or file yields an empty translator. A file that exists
    /// but is not a JSON object is a model load error.
    pub fn load(path: Option<&Path>, modality: &str) -> PipelineResult<Self> {
        let Some(path) = path.filter(|p| p.is_file()) else {
            return Ok(Self::empty());
        };
        let content = std::fs::read_to_string(path)?;
        let raw: HashMap<String, Value> = serde_json::from_str(&content).map_err(|e| {
            PipelineError::model_load(
                modality,
                Some(path),
                "translator file must be a JSON object",
                Some(Box::new(e)),
            )
        })?;
        Ok(Self::from_pairs(
            raw.iter().map(|(k, v)| (k.as_str(), value_to_label(v))),
        ))
    }

    /// Returns the localized name, or `label` itself when unmapped.
    pub fn translate(&self, label: &str) -> String {
        self.map
            .get(&normalize_label(label))
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_array_labels() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "labels.json", r#"["rose", "tulip", "monstera"]"#);
        let labels = load_labels(&path, 3, "species").unwrap();
        assert_eq!(labels, vec!["rose", "tulip", "monstera"]);
    }

    #[test]
    fn test_load_object_labels_sorted_numerically() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "labels.json",
            r#"{"10": "k", "2": "c", "0": "a", "1": "b", "3": "d", "4": "e", "5": "f",
                "6": "g", "7": "h", "8": "i", "9": "j"}"#,
        );
        let labels = load_labels(&path, 11, "species").unwrap();
        assert_eq!(labels[2], "c");
        assert_eq!(labels[10], "k");
    }

    #[test]
    fn test_label_count_mismatch_fails() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "labels.json", r#"["healthy", "rust"]"#);
        let err = load_labels(&path, 3, "disease").unwrap_err();
        assert!(matches!(err, PipelineError::ModelLoad { .. }));
        assert!(err.to_string().contains("num_classes is 3"));
    }

    #[test]
    fn test_non_integer_keys_fail() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "labels.json", r#"{"zero": "a"}"#);
        assert!(load_labels(&path, 1, "species").is_err());
        let path = write(&dir, "scalar.json", "42");
        assert!(load_labels(&path, 1, "species").is_err());
        assert!(load_labels(&dir.path().join("missing.json"), 1, "species").is_err());
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Early  Blight"), "earlyblight");
        assert_eq!(normalize_label("early_blight"), "earlyblight");
        assert_eq!(normalize_label("Early-Blight\t"), "earlyblight");
    }

    #[test]
    fn test_translator_passthrough_and_normalized_hits() {
        let translator = LabelTranslator::from_pairs([("Early Blight", "겹둥근무늬병")]);
        assert_eq!(translator.translate("early_blight"), "겹둥근무늬병");
        assert_eq!(translator.translate("EARLY-BLIGHT"), "겹둥근무늬병");
        assert_eq!(translator.translate("Late Blight"), "Late Blight");
    }

    #[test]
    fn test_translator_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(LabelTranslator::load(Some(&missing), "species").unwrap().is_empty());
        assert!(LabelTranslator::load(None, "species").unwrap().is_empty());

        let path = write(&dir, "tr.json", r#"{"Monstera deliciosa": "몬스테라"}"#);
        let tr = LabelTranslator::load(Some(&path), "species").unwrap();
        assert_eq!(tr.len(), 1);
        assert_eq!(tr.translate("monstera_deliciosa"), "몬스테라");
    }
}
