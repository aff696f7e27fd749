//! Required-key validation of the raw configuration mapping.

use super::schema::AppConfig;
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::validation::{validate_normalization_params, validate_positive, validate_range};
use crate::domain::RouteDecision;
use crate::models::InferenceDevice;
use serde_json::Value;

/// Dotted key paths that every configuration must define.
pub const REQUIRED_KEYS: &[&str] = &[
    "app.default_route",
    "app.skip_morphology",
    "io.input_extensions",
    "io.outputs_dir",
    "logging.level",
    "router.rules",
    "models.species.backend",
    "models.species.ckpt_path",
    "models.species.label_path",
    "models.species.num_classes",
    "models.species.device",
    "models.disease.backend",
    "models.disease.ckpt_path",
    "models.disease.label_path",
    "models.disease.num_classes",
    "models.disease.device",
    "preprocess.common.img_size",
    "preprocess.common.to_rgb",
    "preprocess.common.normalize.enable",
    "preprocess.common.normalize.mean",
    "preprocess.common.normalize.std",
    "preprocess.species.enable",
    "preprocess.species.extra.anchor",
    "preprocess.disease.enable",
    "preprocess.disease.extra.anchor",
];

/// Validates a loaded configuration and produces the typed [`AppConfig`].
///
/// Validation runs once at startup. The first missing key is reported by its
/// full dotted path; nothing downstream ever sees a partial configuration.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates `raw` and deserializes it.
    ///
    /// # Arguments
    ///
    /// * `raw` - The configuration as loaded from TOML or JSON.
    ///
    /// # Returns
    ///
    /// The typed configuration, or the first configuration error found.
    pub fn validate(raw: &Value) -> PipelineResult<AppConfig> {
        Self::check_required(raw)?;
        Self::check_values(raw)?;

        let config: AppConfig = serde_json::from_value(raw.clone())
            .map_err(|e| PipelineError::config_error(format!("malformed configuration: {e}")))?;

        Self::check_typed(&config)?;
        Ok(config)
    }

    /// Fails on the first required key that is absent.
    pub fn check_required(raw: &Value) -> PipelineResult<()> {
        for path in REQUIRED_KEYS {
            if lookup(raw, path).is_none() {
                return Err(PipelineError::MissingConfigKey {
                    path: (*path).to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_values(raw: &Value) -> PipelineResult<()> {
        match lookup(raw, "app.default_route") {
            Some(Value::Null) => {}
            Some(Value::String(s)) => {
                let s = s.trim();
                if !(s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("null"))
                    && s.parse::<RouteDecision>().is_err()
                {
                    return Err(PipelineError::invalid_config(
                        "app.default_route",
                        format!("expected none, species or disease, got '{s}'"),
                    ));
                }
            }
            Some(other) => {
                return Err(PipelineError::invalid_config(
                    "app.default_route",
                    format!("expected a string or null, got {other}"),
                ));
            }
            None => {}
        }

        if !matches!(lookup(raw, "app.skip_morphology"), Some(Value::Bool(_))) {
            return Err(PipelineError::invalid_config(
                "app.skip_morphology",
                "expected a boolean",
            ));
        }

        let Some(Value::Array(rules)) = lookup(raw, "router.rules") else {
            return Err(PipelineError::invalid_config(
                "router.rules",
                "expected a list of {contains, route} objects",
            ));
        };
        for (i, rule) in rules.iter().enumerate() {
            let path = format!("router.rules[{i}]");
            let Value::Object(map) = rule else {
                return Err(PipelineError::invalid_config(path, "expected an object"));
            };
            if !matches!(map.get("contains"), Some(Value::String(_))) {
                return Err(PipelineError::invalid_config(
                    format!("{path}.contains"),
                    "expected a string",
                ));
            }
            let route_ok = map
                .get("route")
                .and_then(Value::as_str)
                .is_some_and(|r| r.parse::<RouteDecision>().is_ok());
            if !route_ok {
                return Err(PipelineError::invalid_config(
                    format!("{path}.route"),
                    "expected 'species' or 'disease'",
                ));
            }
        }

        match lookup(raw, "preprocess.common.img_size") {
            Some(Value::Array(dims))
                if dims.len() == 2 && dims.iter().all(|d| d.as_u64().is_some()) => {}
            _ => {
                return Err(PipelineError::invalid_config(
                    "preprocess.common.img_size",
                    "expected [width, height] as non-negative integers",
                ));
            }
        }

        for modality in RouteDecision::ALL {
            let path = format!("models.{modality}.num_classes");
            match lookup(raw, &path).and_then(Value::as_u64) {
                Some(n) if n > 0 => {}
                _ => {
                    return Err(PipelineError::invalid_config(
                        path,
                        "expected a positive integer",
                    ));
                }
            }

            let path = format!("models.{modality}.device");
            let device = lookup(raw, &path).and_then(Value::as_str).unwrap_or("");
            if let Err(message) = device.parse::<InferenceDevice>() {
                return Err(PipelineError::invalid_config(path, message));
            }
        }

        Ok(())
    }

    fn check_typed(config: &AppConfig) -> PipelineResult<()> {
        let normalize = &config.preprocess.common.normalize;
        validate_normalization_params(
            &normalize.mean,
            &normalize.std,
            "preprocess.common.normalize",
        )?;

        let keep_ratio = config.preprocess.common.keep_ratio;
        if keep_ratio <= 0.0 {
            return Err(PipelineError::invalid_config(
                "preprocess.common.keep_ratio",
                format!("must be in (0, 1], got: {keep_ratio}"),
            ));
        }
        validate_range(keep_ratio, 0.0, 1.0, "preprocess.common.keep_ratio")?;

        validate_positive(config.app.topk, "app.topk")?;

        let morph = &config.morphology;
        validate_range(
            morph.roundness_threshold,
            0.0,
            1.0,
            "morphology.roundness_threshold",
        )?;
        for (i, range) in morph.hsv_masking.color_ranges.iter().enumerate() {
            if range.lower.iter().zip(&range.upper).any(|(lo, hi)| lo > hi) {
                return Err(PipelineError::invalid_config(
                    format!("morphology.hsv_masking.color_ranges[{i}]"),
                    "lower bound exceeds upper bound",
                ));
            }
        }
        Ok(())
    }
}

/// Looks up a dotted path in a nested mapping.
pub fn lookup<'a>(raw: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .try_fold(raw, |node, key| node.as_object()?.get(key))
}
