//! Utility functions for the routing pipeline.
//!
//! This module provides image loading and saving helpers as well as label file
//! and translator handling.

pub mod image;
pub mod labels;

pub use image::{dynamic_to_rgb, load_image, open_oriented, save_png};
pub use labels::{load_labels, normalize_label, LabelTranslator};
