//! Classification results.

use crate::processors::TopkResult;
use serde::{Deserialize, Serialize};

/// One ranked class of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopkEntry {
    pub class_id: usize,
    pub class_name: String,
    pub score: f32,
}

/// The classifier output for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Arg-max class index.
    pub class_id: usize,
    /// English label of the arg-max class.
    pub class_name: String,
    /// Translated label, equal to `class_name` when no translation exists.
    pub class_name_localized: String,
    /// Softmax probability of the arg-max class.
    pub score: f32,
    /// Best classes in descending probability order.
    pub topk: Vec<TopkEntry>,
}

impl Prediction {
    /// Builds a prediction from ranked indexes and a label list.
    ///
    /// Indexes outside the label list are named `class_<id>`.
    pub fn from_topk(
        ranked: &TopkResult,
        labels: &[String],
        translate: impl Fn(&str) -> String,
    ) -> Option<Self> {
        let name_of = |id: usize| {
            labels
                .get(id)
                .cloned()
                .unwrap_or_else(|| format!("class_{id}"))
        };
        let (class_id, score) = ranked.best()?;
        let class_name = name_of(class_id);
        let class_name_localized = translate(&class_name);
        let topk = ranked
            .indexes
            .iter()
            .zip(&ranked.scores)
            .map(|(&class_id, &score)| TopkEntry {
                class_id,
                class_name: name_of(class_id),
                score,
            })
            .collect();

        Some(Self {
            class_id,
            class_name,
            class_name_localized,
            score,
            topk,
        })
    }
}
