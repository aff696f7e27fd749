//! Utility functions for loading and saving images.
//!
//! Images are decoded with their EXIF orientation applied, so a portrait photo
//! taken with a rotated sensor reaches the pipeline upright.

use crate::core::errors::{PipelineError, PipelineResult, ProcessingStage};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use std::path::Path;
use tracing::debug;

/// Converts a DynamicImage to an RgbImage.
pub fn dynamic_to_rgb(img: DynamicImage) -> RgbImage {
    img.to_rgb8()
}

/// Decodes an image and applies its EXIF orientation.
///
/// # Arguments
///
/// * `path` - The image file.
///
/// # Errors
///
/// `ImageNotFound` when the file is absent, `ImageDecode` when it cannot be
/// decoded.
pub fn open_oriented(path: &Path) -> PipelineResult<DynamicImage> {
    if !path.is_file() {
        return Err(PipelineError::ImageNotFound {
            path: path.to_path_buf(),
        });
    }

    let decode_err = |source| PipelineError::ImageDecode {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let mut decoder = reader.into_decoder().map_err(decode_err)?;
    let orientation = decoder.orientation().map_err(decode_err)?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Loads an image from a file path as an H x W x 3 RGB image.
///
/// Images that are not already 8-bit RGB are always converted. `to_rgb` only
/// controls whether an RGB source is re-encoded, which is a no-op for pixels.
///
/// # Arguments
///
/// * `path` - A reference to the path of the image file to load
/// * `to_rgb` - Whether conversion to RGB was requested by the config
///
/// # Errors
///
/// Besides the errors of [`open_oriented`], returns `UnsupportedImageShape`
/// for images with a zero dimension.
pub fn load_image(path: &Path, to_rgb: bool) -> PipelineResult<RgbImage> {
    let img = open_oriented(path)?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let channels = img.color().channel_count() as usize;

    let rgb = match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => {
            debug!(
                path = %path.display(),
                channels,
                to_rgb,
                "converting image to 3-channel RGB"
            );
            dynamic_to_rgb(other)
        }
    };

    if w == 0 || h == 0 {
        return Err(PipelineError::UnsupportedImageShape {
            path: path.to_path_buf(),
            shape: (h, w, channels),
        });
    }
    Ok(rgb)
}

/// Writes an RGB image as PNG, creating parent directories as needed.
pub fn save_png(img: &RgbImage, path: &Path) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| {
            PipelineError::processing(
                ProcessingStage::Output,
                format!("failed to write preview {}", path.display()),
                e,
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_missing_image_is_not_found() {
        let err = load_image(Path::new("/definitely/not/here.jpg"), true).unwrap_err();
        assert!(matches!(err, PipelineError::ImageNotFound { .. }));
    }

    #[test]
    fn test_garbage_file_fails_to_decode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        let err = load_image(&path, true).unwrap_err();
        assert_eq!(err.category(), crate::core::ErrorCategory::ImageLoad);
    }

    #[test]
    fn test_grayscale_and_rgba_become_rgb() {
        let dir = TempDir::new().unwrap();
        let gray_path = dir.path().join("gray.png");
        GrayImage::from_pixel(4, 3, Luma([100])).save(&gray_path).unwrap();
        let rgb = load_image(&gray_path, false).unwrap();
        assert_eq!(rgb.dimensions(), (4, 3));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([100, 100, 100]));

        let rgba_path = dir.path().join("rgba.png");
        RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 4]))
            .save(&rgba_path)
            .unwrap();
        assert_eq!(load_image(&rgba_path, true).unwrap().get_pixel(1, 1), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_save_png_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/preview.png");
        save_png(&RgbImage::from_pixel(3, 3, Rgb([9, 9, 9])), &path).unwrap();
        assert_eq!(load_image(&path, true).unwrap().dimensions(), (3, 3));
    }
}
