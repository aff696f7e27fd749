//! Domain-level structures shared across the routing pipeline.
//!
//! This module groups route decisions, classification results and the
//! interfaces to collaborating systems (care catalog, diagnosis storage).

pub mod collaborators;
pub mod prediction;
pub mod route;

pub use collaborators::{
    CareCatalog, DiagnosisRecord, DiagnosisSink, JsonCareCatalog, MemoryDiagnosisSink,
};
pub use prediction::{Prediction, TopkEntry};
pub use route::{RouteDecision, RoutingRule};
