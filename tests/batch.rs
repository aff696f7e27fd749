mod common;

use common::Fixture;
use plantroute::pipeline::{discover_images, BatchEntry, BatchRunner, RouteOptions, Router};
use serde_json::{json, Value};

#[test]
fn batch_accounts_for_every_image() {
    let fx = Fixture::new();
    let input = fx.path().join("photos");
    fx.leaf_image("photos/Fern/img_plant_1.png");
    fx.leaf_image("photos/rust/img_leaf_2.png");
    fx.gray_image("photos/unknown_3.png");
    std::fs::write(input.join("notes.txt"), "not an image").unwrap();
    let out = fx.path().join("out");

    let router = Router::new(fx.config()).unwrap();
    let summary = BatchRunner::new(router).run(&input, &out).unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.success, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.success + summary.failed, summary.total);

    // Dummy logits always pick class 0: "fern" and "healthy".
    assert_eq!(summary.correct, Some(1));
    assert_eq!(summary.incorrect, Some(1));
    assert_eq!(summary.accuracy, Some(0.5));

    let failure = summary
        .results
        .iter()
        .find_map(|e| match e {
            BatchEntry::Failure(f) => Some(f),
            BatchEntry::Success(_) => None,
        })
        .unwrap();
    assert!(failure.image.ends_with("unknown_3.png"));
    assert_eq!(failure.error_kind, "routing");

    for name in [
        "img_plant_1.json",
        "img_plant_1_preprocessed.png",
        "img_plant_1.png",
        "img_leaf_2.json",
        "batch_summary.json",
    ] {
        assert!(out.join(name).is_file(), "missing {name}");
    }

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("batch_summary.json")).unwrap())
            .unwrap();
    assert_eq!(written["total"], 3);
    assert_eq!(written["results"].as_array().unwrap().len(), 3);
}

#[test]
fn batch_without_ground_truth_has_no_accuracy() {
    let fx = Fixture::new();
    let input = fx.path().join("flat");
    fx.leaf_image("flat/img_plant_a.png");
    fx.leaf_image("flat/img_leaf_b.png");
    let out = fx.path().join("out");

    let router = Router::new(fx.config()).unwrap();
    let summary = BatchRunner::new(router)
        .with_options(RouteOptions::new().skip_morph(true))
        .run(&input, &out)
        .unwrap();
    assert_eq!(summary.success, 2);
    assert!(summary.accuracy.is_none());

    let result: Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("img_leaf_b.json")).unwrap())
            .unwrap();
    assert_eq!(result["meta"]["stages"], json!(["image", "model:disease"]));
}

#[test]
fn parallel_batch_keeps_sorted_order() {
    let fx = Fixture::new();
    let input = fx.path().join("many");
    for i in 0..8 {
        fx.leaf_image(&format!("many/img_plant_{i:02}.png"));
    }
    let out = fx.path().join("out");

    let router = Router::new(fx.config()).unwrap();
    let summary = BatchRunner::new(router)
        .with_parallel_threshold(2)
        .run(&input, &out)
        .unwrap();
    assert_eq!(summary.success, 8);

    let images: Vec<_> = summary
        .results
        .iter()
        .map(|e| match e {
            BatchEntry::Success(s) => s.image.clone(),
            BatchEntry::Failure(f) => f.image.clone(),
        })
        .collect();
    let mut sorted = images.clone();
    sorted.sort();
    assert_eq!(images, sorted);
}

#[test]
fn discovery_filters_extensions_case_insensitively() {
    let fx = Fixture::new();
    let input = fx.path().join("mixed");
    fx.leaf_image("mixed/a.PNG");
    fx.leaf_image("mixed/sub/b.png");
    fx.leaf_image("mixed/c.bmp");
    let config = fx.config();

    let found = discover_images(&input, &config.io).unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn batch_into_its_own_input_directory_keeps_inputs_intact() {
    let fx = Fixture::new();
    let input = fx.path().join("photos");
    let leaf = fx.leaf_image("photos/img_leaf_1.png");
    let plant = fx.leaf_image("photos/img_plant_1.png");
    let before = [
        std::fs::read(&leaf).unwrap(),
        std::fs::read(&plant).unwrap(),
    ];

    let router = Router::new(fx.config()).unwrap();
    let summary = BatchRunner::new(router).run(&input, &input).unwrap();
    assert_eq!(summary.success, 2);

    assert_eq!(std::fs::read(&leaf).unwrap(), before[0]);
    assert_eq!(std::fs::read(&plant).unwrap(), before[1]);
    assert!(image::open(&leaf).is_ok());
    assert!(input.join("img_leaf_1.json").is_file());
    assert!(input.join("img_plant_1_preprocessed.png").is_file());
}

#[test]
fn batch_outputs_never_overwrite_other_inputs() {
    let fx = Fixture::new();
    let input = fx.path().join("photos");
    fx.leaf_image("photos/a/leaf.png");
    let top_level = fx.gray_image("photos/leaf.png");
    let before = std::fs::read(&top_level).unwrap();

    let router = Router::new(fx.config()).unwrap();
    let summary = BatchRunner::new(router).run(&input, &input).unwrap();
    assert_eq!(summary.success, 2);

    // "a/leaf.png" takes the stem "leaf", whose copy target is the top-level input.
    assert_eq!(std::fs::read(&top_level).unwrap(), before);
    assert!(input.join("leaf.json").is_file());
    assert!(input.join("leaf_2.json").is_file());
    assert!(input.join("leaf_2.png").is_file());
}
