//! Ordered stage plans.
//!
//! The router does not hard-wire its control flow. It builds a
//! [`PipelinePlan`] for the chosen route and executes the stages in order,
//! so the stage trail of a result is exactly the list of stages it ran.

use crate::domain::RouteDecision;
use std::fmt;

/// One step of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Load the image and fit it to the model geometry of a mode.
    Image(RouteDecision),
    /// Leaf segmentation.
    Morphology,
    /// Normalization and inference with a modality's model.
    Model(RouteDecision),
}

impl Stage {
    /// The name recorded in `meta.stages`.
    pub fn label(&self) -> String {
        match self {
            Stage::Image(_) => "image".to_string(),
            Stage::Morphology => "morphology".to_string(),
            Stage::Model(modality) => format!("model:{modality}"),
        }
    }

    /// The key used in `timing_ms`.
    pub fn timing_key(&self) -> &'static str {
        match self {
            Stage::Image(_) => "image",
            Stage::Morphology => "morphology",
            Stage::Model(_) => "model",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// The stages one input goes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
    route: RouteDecision,
    stages: Vec<Stage>,
}

impl PipelinePlan {
    /// Builds the plan of a route.
    ///
    /// Species inputs never segment. Disease inputs segment unless
    /// `skip_morphology` is set.
    pub fn build(route: RouteDecision, skip_morphology: bool) -> Self {
        let mut stages = vec![Stage::Image(route)];
        if route == RouteDecision::Disease && !skip_morphology {
            stages.push(Stage::Morphology);
        }
        stages.push(Stage::Model(route));
        Self { route, stages }
    }

    pub fn route(&self) -> RouteDecision {
        self.route
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn labels(&self) -> Vec<String> {
        self.stages.iter().map(Stage::label).collect()
    }
}
