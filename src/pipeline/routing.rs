//! The route decision procedure.

use crate::core::errors::{PipelineError, PipelineResult};
use crate::domain::{RouteDecision, RoutingRule};
use std::path::Path;

const SPECIES_KEYWORD: &str = "plant";
const DISEASE_KEYWORD: &str = "leaf";

/// Returns the lowercase file stem of `filename`.
///
/// Both bare names (`img_leaf_01`) and paths (`photos/img_leaf_01.jpg`) are
/// accepted.
pub fn file_stem_lower(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| filename.to_lowercase())
}

/// Chooses the pipeline for a file.
///
/// Resolution order:
///
/// 1. `forced`, when given.
/// 2. The first rule whose `contains` occurs in the stem, case-insensitively.
/// 3. `plant` without `leaf` routes to species, `leaf` without `plant` to
///    disease.
/// 4. `default_route`.
///
/// # Errors
///
/// [`PipelineError::Routing`] when none of the above applies, including stems
/// that carry both keywords and no default is configured.
pub fn choose_route(
    filename: &str,
    rules: &[RoutingRule],
    forced: Option<RouteDecision>,
    default_route: Option<RouteDecision>,
) -> PipelineResult<RouteDecision> {
    if let Some(route) = forced {
        return Ok(route);
    }

    let stem = file_stem_lower(filename);

    if let Some(rule) = rules.iter().find(|rule| rule.matches(&stem)) {
        return Ok(rule.route);
    }

    let has_plant = stem.contains(SPECIES_KEYWORD);
    let has_leaf = stem.contains(DISEASE_KEYWORD);
    match (has_plant, has_leaf) {
        (true, false) => return Ok(RouteDecision::Species),
        (false, true) => return Ok(RouteDecision::Disease),
        _ => {}
    }

    if let Some(route) = default_route {
        return Ok(route);
    }

    let reason = if has_plant && has_leaf {
        "no rule matched and the name contains both 'plant' and 'leaf'; set app.default_route or use --force"
    } else {
        "no rule matched, no 'plant' or 'leaf' keyword and no app.default_route; use --force"
    };
    Err(PipelineError::routing(filename, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorCategory;
    use proptest::prelude::*;

    #[test]
    fn test_plant_keyword_routes_to_species() {
        assert_eq!(
            choose_route("img_plant_0001", &[], None, None).unwrap(),
            RouteDecision::Species
        );
    }

    #[test]
    fn test_leaf_keyword_routes_to_disease() {
        assert_eq!(
            choose_route("img_leaf_0002", &[], None, None).unwrap(),
            RouteDecision::Disease
        );
    }

    #[test]
    fn test_ambiguous_name_without_default_fails() {
        let err = choose_route("ambiguous_plant_leaf", &[], None, None).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Routing);
        assert!(err.to_string().contains("ambiguous_plant_leaf"));
    }

    #[test]
    fn test_ambiguous_name_with_default_uses_default() {
        assert_eq!(
            choose_route(
                "ambiguous_plant_leaf",
                &[],
                None,
                Some(RouteDecision::Species)
            )
            .unwrap(),
            RouteDecision::Species
        );
    }

    #[test]
    fn test_no_keyword_uses_default_or_fails() {
        assert_eq!(
            choose_route("IMG_1234.jpg", &[], None, Some(RouteDecision::Disease)).unwrap(),
            RouteDecision::Disease
        );
        assert!(choose_route("IMG_1234.jpg", &[], None, None).is_err());
    }

    #[test]
    fn test_forced_wins_over_everything() {
        let rules = vec![RoutingRule::new("leaf", RouteDecision::Disease)];
        assert_eq!(
            choose_route("leaf_01", &rules, Some(RouteDecision::Species), None).unwrap(),
            RouteDecision::Species
        );
    }

    #[test]
    fn test_rules_match_stem_case_insensitively() {
        let rules = vec![RoutingRule::new("Tomato", RouteDecision::Disease)];
        assert_eq!(
            choose_route("garden/TOMATO_plant.JPG", &rules, None, None).unwrap(),
            RouteDecision::Disease
        );
    }

    #[test]
    fn test_extension_is_not_part_of_the_stem() {
        let rules = vec![RoutingRule::new("jpg", RouteDecision::Disease)];
        assert_eq!(
            choose_route("my_plant.jpg", &rules, None, None).unwrap(),
            RouteDecision::Species
        );
    }

    fn route_strategy() -> impl Strategy<Value = RouteDecision> {
        prop_oneof![Just(RouteDecision::Species), Just(RouteDecision::Disease)]
    }

    fn rules_strategy() -> impl Strategy<Value = Vec<RoutingRule>> {
        prop::collection::vec(
            ("[a-z]{1,4}", route_strategy()).prop_map(|(c, r)| RoutingRule::new(c, r)),
            0..5,
        )
    }

    proptest! {
        #[test]
        fn prop_choose_route_is_deterministic(
            name in "[a-zA-Z_]{0,16}",
            rules in rules_strategy(),
            forced in prop::option::of(route_strategy()),
            default in prop::option::of(route_strategy()),
        ) {
            let first = choose_route(&name, &rules, forced, default).ok();
            let second = choose_route(&name, &rules, forced, default).ok();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_first_matching_rule_wins(
            prefix in "[a-z]{0,6}",
            key in "[a-z]{2,5}",
            first in route_strategy(),
            later in route_strategy(),
        ) {
            let rules = vec![
                RoutingRule::new(key.clone(), first),
                RoutingRule::new(key.clone(), later),
                RoutingRule::new(prefix.clone(), later),
            ];
            let name = format!("{prefix}{key}");
            prop_assert_eq!(choose_route(&name, &rules, None, None).unwrap(), first);
        }
    }
}
