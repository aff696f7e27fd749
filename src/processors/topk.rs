//! Softmax and top-k extraction for classifier outputs.

/// Top-k indexes and scores of one prediction, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct TopkResult {
    /// Class indexes, highest score first.
    pub indexes: Vec<usize>,
    /// Scores matching `indexes`.
    pub scores: Vec<f32>,
}

impl TopkResult {
    /// Best index and score, if any.
    pub fn best(&self) -> Option<(usize, f32)> {
        Some((*self.indexes.first()?, *self.scores.first()?))
    }
}

/// Numerically stable softmax over one logit row.
///
/// # Arguments
///
/// * `logits` - Raw classifier outputs.
///
/// # Returns
///
/// Probabilities summing to 1, or an empty vector for empty input.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        let uniform = 1.0 / logits.len() as f32;
        return vec![uniform; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

/// Extracts the `k` highest scores of a prediction.
///
/// `k` is clamped to the number of classes. Ties keep the lower index first,
/// so an all-equal row yields `0, 1, 2, ...`.
///
/// # Errors
///
/// Returns an error if `k` is 0 or the prediction is empty.
pub fn topk(prediction: &[f32], k: usize) -> Result<TopkResult, String> {
    if k == 0 {
        return Err("k must be greater than 0".to_string());
    }
    if prediction.is_empty() {
        return Err("Empty prediction vector".to_string());
    }

    let mut indexed_scores: Vec<(usize, f32)> = prediction.iter().copied().enumerate().collect();
    // Stable sort keeps ties in index order.
    indexed_scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed_scores.truncate(k.min(prediction.len()));

    let (indexes, scores) = indexed_scores.into_iter().unzip();
    Ok(TopkResult { indexes, scores })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_of_zero_logits_is_uniform() {
        let probs = softmax(&[0.0; 4]);
        assert!(probs.iter().all(|&p| (p - 0.25).abs() < 1e-6));
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn test_softmax_handles_large_logits() {
        let probs = softmax(&[1000.0, 0.0]);
        assert!((probs[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_topk_orders_and_clamps() {
        let result = topk(&[0.1, 0.7, 0.2], 5).unwrap();
        assert_eq!(result.indexes, vec![1, 2, 0]);
        assert_eq!(result.best(), Some((1, 0.7)));
    }

    #[test]
    fn test_topk_ties_prefer_lower_index() {
        let result = topk(&[0.25; 4], 2).unwrap();
        assert_eq!(result.indexes, vec![0, 1]);
    }

    #[test]
    fn test_topk_errors() {
        assert!(topk(&[0.5], 0).is_err());
        assert!(topk(&[], 3).is_err());
    }
}
