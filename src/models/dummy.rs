//! Deterministic stub classifier.

use super::Classifier;
use crate::core::errors::PipelineResult;
use crate::core::{Tensor2D, Tensor4D};

/// Produces all-zero logits of the configured width.
///
/// After softmax every class is equally likely and class 0 wins the arg-max,
/// which makes end-to-end wiring tests deterministic.
#[derive(Debug, Clone)]
pub struct DummyClassifier {
    num_classes: usize,
}

impl DummyClassifier {
    pub fn new(num_classes: usize) -> Self {
        Self { num_classes }
    }
}

impl Classifier for DummyClassifier {
    fn name(&self) -> &str {
        "dummy"
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn forward(&self, batch: &Tensor4D) -> PipelineResult<Tensor2D> {
        Ok(Tensor2D::zeros((batch.shape()[0], self.num_classes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_logits_of_right_width() {
        let model = DummyClassifier::new(7);
        let out = model.forward(&Tensor4D::ones((2, 3, 4, 4))).unwrap();
        assert_eq!(out.shape(), &[2, 7]);
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
