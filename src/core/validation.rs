//! Input Validation Utilities
//!
//! Small checks shared by the config validator and the processors. Each one
//! reports the dotted path or parameter name it was given, so failures point at
//! the exact offending value.

use crate::core::errors::{PipelineError, PipelineResult};

/// Validates that a float value is finite (not NaN or infinite).
#[inline]
pub fn validate_finite(value: f32, param_name: &str) -> PipelineResult<()> {
    if !value.is_finite() {
        return Err(PipelineError::invalid_config(
            param_name,
            format!("must be finite, got: {value}"),
        ));
    }
    Ok(())
}

/// Validates that a value is within a specified range (inclusive).
#[inline]
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    param_name: &str,
) -> PipelineResult<()> {
    if value < min || value > max {
        return Err(PipelineError::invalid_config(
            param_name,
            format!("must be in range [{min}, {max}], got: {value}"),
        ));
    }
    Ok(())
}

/// Validates that a value is positive (> 0).
#[inline]
pub fn validate_positive<T: PartialOrd + std::fmt::Display + Default>(
    value: T,
    param_name: &str,
) -> PipelineResult<()> {
    if value <= T::default() {
        return Err(PipelineError::invalid_config(
            param_name,
            format!("must be positive, got: {value}"),
        ));
    }
    Ok(())
}

/// Validates normalization parameters (mean and std).
///
/// Each vector holds either a single value applied to every channel, or at
/// least one value per RGB channel. Every std entry must be positive.
///
/// # Arguments
///
/// * `mean` - Per-channel means.
/// * `std` - Per-channel standard deviations.
/// * `prefix` - Dotted path of the section holding both vectors.
pub fn validate_normalization_params(mean: &[f32], std: &[f32], prefix: &str) -> PipelineResult<()> {
    for (name, values) in [("mean", mean), ("std", std)] {
        let path = format!("{prefix}.{name}");
        if values.len() != 1 && values.len() < 3 {
            return Err(PipelineError::invalid_config(
                path,
                format!(
                    "expected 1 value or at least 3 values, got {}",
                    values.len()
                ),
            ));
        }
        for (i, &v) in values.iter().enumerate() {
            validate_finite(v, &format!("{path}[{i}]"))?;
        }
    }

    for (i, &s) in std.iter().enumerate() {
        validate_positive(s, &format!("{prefix}.std[{i}]"))?;
    }

    Ok(())
}
