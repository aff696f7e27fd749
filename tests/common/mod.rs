//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use plantroute::core::{AppConfig, ConfigLoader};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SPECIES_LABELS: [&str; 3] = ["fern", "rose", "tulip"];
pub const DISEASE_LABELS: [&str; 2] = ["healthy", "rust"];

/// A working directory holding label files, a config and input images.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("species_labels.json"),
            serde_json::to_string(&SPECIES_LABELS).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("disease_labels.json"),
            serde_json::to_string(&DISEASE_LABELS).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("species_vi.json"),
            r#"{"Fern": "Dương xỉ"}"#,
        )
        .unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn raw_config(&self) -> Value {
        let p = |name: &str| self.path().join(name).display().to_string();
        json!({
            "app": {"default_route": "none", "skip_morphology": false},
            "io": {
                "input_extensions": ["jpg", ".png"],
                "outputs_dir": p("outputs"),
            },
            "logging": {"level": "warn"},
            "router": {"rules": []},
            "models": {
                "species": {
                    "backend": "dummy",
                    "ckpt_path": p("species.ckpt"),
                    "label_path": p("species_labels.json"),
                    "num_classes": 3,
                    "device": "cpu",
                    "translate_path": p("species_vi.json"),
                },
                "disease": {
                    "backend": "dummy",
                    "ckpt_path": p("disease.ckpt"),
                    "label_path": p("disease_labels.json"),
                    "num_classes": 2,
                    "device": "cpu",
                },
            },
            "preprocess": {
                "common": {
                    "img_size": [32, 32],
                    "to_rgb": true,
                    "normalize": {
                        "enable": true,
                        "mean": [0.485, 0.456, 0.406],
                        "std": [0.229, 0.224, 0.225],
                    },
                },
                "species": {"enable": true, "extra": {"anchor": "center"}},
                "disease": {"enable": true, "extra": {"anchor": "top"}},
            },
        })
    }

    /// Writes `raw` as `config.json` and loads it through the validator.
    pub fn load(&self, raw: &Value) -> AppConfig {
        let path = self.path().join("config.json");
        std::fs::write(&path, serde_json::to_string_pretty(raw).unwrap()).unwrap();
        ConfigLoader::load_from_file(&path).unwrap()
    }

    pub fn config(&self) -> AppConfig {
        self.load(&self.raw_config())
    }

    /// Writes a leaf-like image (green disk on white) under the fixture.
    pub fn leaf_image(&self, relative: &str) -> PathBuf {
        let path = self.path().join(relative);
        leaf_disk(64, 48).save(ensure_parent(&path)).unwrap();
        path
    }

    /// Writes a plain gray image under the fixture.
    pub fn gray_image(&self, relative: &str) -> PathBuf {
        let path = self.path().join(relative);
        RgbImage::from_pixel(40, 30, Rgb([128, 128, 128]))
            .save(ensure_parent(&path))
            .unwrap();
        path
    }
}

fn ensure_parent(path: &Path) -> &Path {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    path
}

/// A green disk of radius `h / 3` centered in a white `w x h` frame.
pub fn leaf_disk(w: u32, h: u32) -> RgbImage {
    let (cx, cy, r) = (w as f32 / 2.0, h as f32 / 2.0, h as f32 / 3.0);
    RgbImage::from_fn(w, h, |x, y| {
        let (dx, dy) = (x as f32 - cx, y as f32 - cy);
        if dx * dx + dy * dy <= r * r {
            Rgb([34, 139, 34])
        } else {
            Rgb([255, 255, 255])
        }
    })
}
