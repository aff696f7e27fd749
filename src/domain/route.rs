//! Route decisions and routing rules.
//!
//! A [`RouteDecision`] names the inference pipeline an input belongs to. It is
//! also the modality key for the model runtimes and preprocessing sections.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The pipeline an image is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteDecision {
    /// Plant species identification from a whole-plant photo.
    Species,
    /// Leaf disease diagnosis from a close-up leaf photo.
    Disease,
}

impl RouteDecision {
    /// Both routes, in declaration order.
    pub const ALL: [RouteDecision; 2] = [RouteDecision::Species, RouteDecision::Disease];

    /// Returns the lowercase name used in configs, stage trails and results.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteDecision::Species => "species",
            RouteDecision::Disease => "disease",
        }
    }
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteDecision {
    type Err = String;

    /// Parses `species` or `disease`, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "species" => Ok(RouteDecision::Species),
            "disease" => Ok(RouteDecision::Disease),
            other => Err(format!(
                "unknown route '{other}', expected one of 'species' or 'disease'"
            )),
        }
    }
}

/// A filename rule: if `contains` occurs in the file stem, route to `route`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Substring matched case-insensitively against the file stem.
    pub contains: String,
    /// Route chosen when the substring matches.
    pub route: RouteDecision,
}

impl RoutingRule {
    /// Creates a new rule.
    pub fn new(contains: impl Into<String>, route: RouteDecision) -> Self {
        Self {
            contains: contains.into(),
            route,
        }
    }

    /// Returns true when the rule matches an already lowercased stem.
    ///
    /// Empty patterns never match.
    pub fn matches(&self, stem_lower: &str) -> bool {
        let key = self.contains.to_lowercase();
        !key.is_empty() && stem_lower.contains(&key)
    }
}
