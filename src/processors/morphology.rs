//! HSV color masking and binary morphology.
//!
//! Hue, saturation and value use OpenCV's 8-bit convention: hue is halved to
//! fit `0..180`, saturation and value span `0..=255`. Masks are [`GrayImage`]s
//! holding 0 for background and 255 for foreground.

use crate::core::config::{HsvRange, MorphOpConfig, StructuringShape};
use crate::core::constants::HSV_HUE_MAX;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology;

/// Foreground value of a binary mask.
pub const FOREGROUND: u8 = 255;

/// Converts an RGB pixel to OpenCV-style 8-bit HSV.
pub fn rgb_to_hsv(pixel: &Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0.map(f32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v > 0.0 { delta / v * 255.0 } else { 0.0 };
    let h = if delta <= 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    let hue = ((h / 2.0).round() as u16 % HSV_HUE_MAX as u16) as u8;
    [hue, s.round() as u8, v as u8]
}

/// Builds the union of the inclusion masks of all `ranges`.
pub fn hsv_mask(img: &RgbImage, ranges: &[HsvRange]) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut mask = GrayImage::new(w, h);
    for (x, y, pixel) in img.enumerate_pixels() {
        let hsv = rgb_to_hsv(pixel);
        if ranges.iter().any(|range| range.contains(hsv)) {
            mask.put_pixel(x, y, Luma([FOREGROUND]));
        }
    }
    mask
}

/// Number of foreground pixels in a mask.
pub fn count_foreground(mask: &GrayImage) -> usize {
    mask.as_raw().iter().filter(|&&v| v > 0).count()
}

/// Forces every pixel to 0 or 255.
pub fn binarize(mask: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y)[0] > threshold {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Binary dilation or erosion with a shaped structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Dilate,
    Erode,
}

fn step(mask: &GrayImage, pass: Pass, norm: Norm, radius: u8) -> GrayImage {
    match pass {
        Pass::Dilate => morphology::dilate(mask, norm, radius),
        Pass::Erode => morphology::erode(mask, norm, radius),
    }
}

/// Applies one pass of a `ksize` element of the given shape.
///
/// Rectangles use the Chebyshev norm and crosses the L1 norm. Ellipses are
/// approximated by alternating unit Chebyshev and L1 steps, which grows an
/// octagon.
fn shaped(mask: &GrayImage, pass: Pass, shape: StructuringShape, ksize: [u32; 2]) -> GrayImage {
    let radius = (ksize[0].max(ksize[1]) / 2).min(u8::MAX as u32) as u8;
    if radius == 0 {
        return mask.clone();
    }
    match shape {
        StructuringShape::Rect => step(mask, pass, Norm::LInf, radius),
        StructuringShape::Cross => step(mask, pass, Norm::L1, radius),
        StructuringShape::Ellipse => (0..radius).fold(mask.clone(), |acc, i| {
            let norm = if i % 2 == 0 { Norm::L1 } else { Norm::LInf };
            step(&acc, pass, norm, 1)
        }),
    }
}

fn repeat(mask: &GrayImage, op: &MorphOpConfig, pass: Pass) -> GrayImage {
    (0..op.iter.max(1)).fold(mask.clone(), |acc, _| shaped(&acc, pass, op.shape, op.ksize))
}

/// Dilation followed by erosion; fills small holes.
pub fn close(mask: &GrayImage, op: &MorphOpConfig) -> GrayImage {
    if !op.enable {
        return mask.clone();
    }
    let dilated = repeat(mask, op, Pass::Dilate);
    repeat(&dilated, op, Pass::Erode)
}

/// Erosion followed by dilation; removes small specks.
pub fn open(mask: &GrayImage, op: &MorphOpConfig) -> GrayImage {
    if !op.enable {
        return mask.clone();
    }
    let eroded = repeat(mask, op, Pass::Erode);
    repeat(&eroded, op, Pass::Dilate)
}

pub fn erode(mask: &GrayImage, op: &MorphOpConfig) -> GrayImage {
    if !op.enable {
        return mask.clone();
    }
    repeat(mask, op, Pass::Erode)
}

pub fn dilate(mask: &GrayImage, op: &MorphOpConfig) -> GrayImage {
    if !op.enable {
        return mask.clone();
    }
    repeat(mask, op, Pass::Dilate)
}

/// Softens a mask boundary with a Gaussian blur and re-thresholds it at 127.
///
/// `blur_size` is the kernel width; sigma is derived from it the same way
/// OpenCV does for an unspecified sigma.
pub fn smooth_edges(mask: &GrayImage, blur_size: u32) -> GrayImage {
    let k = if blur_size % 2 == 0 {
        blur_size + 1
    } else {
        blur_size
    };
    let sigma = (0.3 * ((k as f32 - 1.0) * 0.5 - 1.0) + 0.8).max(0.1);
    binarize(&gaussian_blur_f32(mask, sigma), 127)
}
