mod common;

use common::{Fixture, SPECIES_LABELS};
use plantroute::core::{ErrorCategory, PipelineError};
use plantroute::domain::{JsonCareCatalog, MemoryDiagnosisSink, RouteDecision};
use plantroute::pipeline::{RouteOptions, Router};
use serde_json::json;
use std::sync::Arc;

#[test]
fn species_path_never_segments() {
    let fx = Fixture::new();
    let image = fx.leaf_image("img_plant_0001.png");
    let router = Router::new(fx.config()).unwrap();

    let result = router.route(&image, &RouteOptions::new()).unwrap();
    assert_eq!(result.route, RouteDecision::Species);
    assert_eq!(result.meta.stages, vec!["image", "model:species"]);
    assert!(result.meta.segmentation.is_none());
    assert_eq!(result.prediction.class_id, 0);
    assert_eq!(result.prediction.class_name, "fern");
    assert_eq!(result.prediction.class_name_localized, "Dương xỉ");
    assert_eq!(result.prediction.topk.len(), SPECIES_LABELS.len());
}

#[test]
fn skip_morph_leaves_no_morphology_stage() {
    let fx = Fixture::new();
    let image = fx.leaf_image("img_leaf_0002.png");
    let router = Router::new(fx.config()).unwrap();

    let result = router
        .route(&image, &RouteOptions::new().skip_morph(true))
        .unwrap();
    assert_eq!(result.route, RouteDecision::Disease);
    assert!(!result.meta.stages.iter().any(|s| s == "morphology"));
    assert_eq!(result.meta.stages, vec!["image", "model:disease"]);
}

#[test]
fn config_skip_morphology_is_the_default() {
    let fx = Fixture::new();
    let image = fx.leaf_image("img_leaf_0003.png");
    let mut raw = fx.raw_config();
    raw["app"]["skip_morphology"] = json!(true);
    let router = Router::new(fx.load(&raw)).unwrap();

    let skipped = router.route(&image, &RouteOptions::new()).unwrap();
    assert_eq!(skipped.meta.stages, vec!["image", "model:disease"]);

    let forced_on = router
        .route(&image, &RouteOptions::new().skip_morph(false))
        .unwrap();
    assert!(forced_on.meta.stages.iter().any(|s| s == "morphology"));
}

#[test]
fn disease_path_segments_and_keeps_model_geometry() {
    let fx = Fixture::new();
    let image = fx.leaf_image("img_leaf_0004.png");
    let router = Router::new(fx.config()).unwrap();

    let out = router.route_detailed(&image, &RouteOptions::new()).unwrap();
    assert_eq!(
        out.result.meta.stages,
        vec!["image", "morphology", "model:disease"]
    );
    let seg = out.result.meta.segmentation.as_ref().unwrap();
    assert!(seg.applied);
    assert!(!seg.used_original);
    assert!(seg.roundness > 0.3);
    assert!(out.result.used_segmentation());
    assert_eq!(out.model_input.dimensions(), (32, 32));
    assert!(out.result.timing_ms.stages.contains_key("morphology"));
}

#[test]
fn segmentation_falls_back_on_featureless_images() {
    let fx = Fixture::new();
    let image = fx.gray_image("gray_leaf.png");
    let router = Router::new(fx.config()).unwrap();

    let result = router.route(&image, &RouteOptions::new()).unwrap();
    let seg = result.meta.segmentation.unwrap();
    assert!(seg.used_original);
    assert!(result.meta.stages.iter().any(|s| s == "morphology"));
}

#[test]
fn ambiguous_name_is_a_routing_error() {
    let fx = Fixture::new();
    let image = fx.leaf_image("ambiguous_plant_leaf.png");
    let router = Router::new(fx.config()).unwrap();

    let err = router.route(&image, &RouteOptions::new()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Routing);

    let forced = router
        .route(&image, &RouteOptions::new().force(RouteDecision::Species))
        .unwrap();
    assert_eq!(forced.route, RouteDecision::Species);
}

#[test]
fn rules_and_default_route_apply() {
    let fx = Fixture::new();
    let mut raw = fx.raw_config();
    raw["router"]["rules"] = json!([{"contains": "tomato", "route": "disease"}]);
    raw["app"]["default_route"] = json!("species");
    let router = Router::new(fx.load(&raw)).unwrap();

    let by_rule = fx.leaf_image("Tomato_plant_7.png");
    assert_eq!(
        router.route(&by_rule, &RouteOptions::new()).unwrap().route,
        RouteDecision::Disease
    );
    let by_default = fx.leaf_image("IMG_0042.png");
    assert_eq!(
        router.route(&by_default, &RouteOptions::new()).unwrap().route,
        RouteDecision::Species
    );
}

#[test]
fn missing_image_is_reported() {
    let fx = Fixture::new();
    let router = Router::new(fx.config()).unwrap();
    let err = router
        .route(&fx.path().join("img_plant_missing.png"), &RouteOptions::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::ImageNotFound { .. }));
    assert_eq!(err.category(), ErrorCategory::ImageLoad);
}

#[test]
fn preview_is_written_when_requested() {
    let fx = Fixture::new();
    let image = fx.leaf_image("img_plant_0005.png");
    let preview = fx.path().join("out/img_plant_0005_preprocessed.png");
    let router = Router::new(fx.config()).unwrap();

    let result = router
        .route(&image, &RouteOptions::new().preview_path(&preview))
        .unwrap();
    assert_eq!(result.meta.preview.as_deref(), Some(preview.as_path()));
    let saved = image::open(&preview).unwrap();
    assert_eq!((saved.width(), saved.height()), (32, 32));
}

#[test]
fn label_count_mismatch_fails_the_request() {
    let fx = Fixture::new();
    let mut raw = fx.raw_config();
    raw["models"]["species"]["num_classes"] = json!(4);
    let router = Router::new(fx.load(&raw)).unwrap();
    let image = fx.leaf_image("img_plant_0006.png");

    let err = router.route(&image, &RouteOptions::new()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ModelLoad);
}

#[test]
fn collaborators_are_called() {
    let fx = Fixture::new();
    let catalog = JsonCareCatalog::from_value(json!({"fern": {"water": "keep moist"}})).unwrap();
    let sink = Arc::new(MemoryDiagnosisSink::new());
    let router = Router::new(fx.config())
        .unwrap()
        .with_care_catalog(Arc::new(catalog))
        .with_diagnosis_sink(sink.clone());

    let species = router
        .route(&fx.leaf_image("img_plant_0007.png"), &RouteOptions::new())
        .unwrap();
    assert_eq!(species.care, Some(json!({"water": "keep moist"})));

    let disease = router
        .route(&fx.leaf_image("img_leaf_0008.png"), &RouteOptions::new())
        .unwrap();
    assert!(disease.care.is_none());
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].prediction, disease.prediction);
}

#[test]
fn concurrent_requests_share_one_model() {
    let fx = Fixture::new();
    let image = fx.leaf_image("img_leaf_0009.png");
    let router = Router::new(fx.config()).unwrap();

    let predictions: Vec<_> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..6)
            .map(|_| s.spawn(|| router.route(&image, &RouteOptions::new()).unwrap()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    assert!(predictions
        .windows(2)
        .all(|w| w[0].prediction == w[1].prediction));

    let runtime = router.registry().get(RouteDecision::Disease);
    let first = runtime.handle().unwrap() as *const _;
    assert!(std::ptr::eq(first, runtime.handle().unwrap()));
}
