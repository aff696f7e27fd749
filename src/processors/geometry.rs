//! Geometric primitives for contour analysis.
//!
//! Contours traced from a binary mask are treated as closed polygons. The
//! segmenter ranks them by enclosed area and gates them on roundness.

use imageproc::contours::Contour;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Grows the rectangle by `padding` on every side, clamped to a
    /// `bound_w x bound_h` frame.
    ///
    /// # Arguments
    ///
    /// * `padding` - Pixels added on each side.
    /// * `bound_w` - Frame width.
    /// * `bound_h` - Frame height.
    ///
    /// # Returns
    ///
    /// The padded rectangle, never extending past the frame.
    pub fn pad_clamped(&self, padding: u32, bound_w: u32, bound_h: u32) -> Rect {
        let x = self.x.saturating_sub(padding).min(bound_w.saturating_sub(1));
        let y = self.y.saturating_sub(padding).min(bound_h.saturating_sub(1));
        let right = self
            .x
            .saturating_add(self.width)
            .saturating_add(padding)
            .min(bound_w);
        let bottom = self
            .y
            .saturating_add(self.height)
            .saturating_add(padding)
            .min(bound_h);
        Rect {
            x,
            y,
            width: right.saturating_sub(x).max(1),
            height: bottom.saturating_sub(y).max(1),
        }
    }

    /// Returns true if the rectangle spans the whole `w x h` frame.
    pub fn covers(&self, w: u32, h: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == w && self.height == h
    }
}

/// A closed polygon traced from a mask boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polygon {
    /// Vertices in tracing order; the last connects back to the first.
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates a polygon from a contour.
    pub fn from_contour(contour: &Contour<u32>) -> Self {
        let points = contour
            .points
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect();
        Self { points }
    }

    /// Calculates the enclosed area using the shoelace formula.
    ///
    /// # Returns
    ///
    /// The area of the polygon. Returns 0.0 if it has fewer than 3 points.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }

        let mut area = 0.0;
        let n = self.points.len();
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.points[i].x * self.points[j].y;
            area -= self.points[j].x * self.points[i].y;
        }
        area.abs() / 2.0
    }

    /// Calculates the length of the closed boundary.
    pub fn perimeter(&self) -> f32 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let mut perimeter = 0.0;
        let n = self.points.len();
        for i in 0..n {
            let j = (i + 1) % n;
            let dx = self.points[j].x - self.points[i].x;
            let dy = self.points[j].y - self.points[i].y;
            perimeter += (dx * dx + dy * dy).sqrt();
        }
        perimeter
    }

    /// Computes `4 * PI * area / perimeter^2`.
    ///
    /// A disc scores close to 1.0; lines and fragments score near 0. A
    /// degenerate polygon with zero perimeter scores 0.
    pub fn roundness(&self) -> f32 {
        let perimeter = self.perimeter();
        if perimeter <= f32::EPSILON {
            return 0.0;
        }
        4.0 * PI * self.area() / (perimeter * perimeter)
    }

    /// Smallest axis-aligned rectangle containing every vertex, inclusive of
    /// the boundary pixels.
    pub fn bounding_rect(&self) -> Option<Rect> {
        let first = self.points.first()?;
        let (mut x_min, mut y_min, mut x_max, mut y_max) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            x_min = x_min.min(p.x);
            y_min = y_min.min(p.y);
            x_max = x_max.max(p.x);
            y_max = y_max.max(p.y);
        }
        let x = x_min.max(0.0) as u32;
        let y = y_min.max(0.0) as u32;
        Some(Rect::new(
            x,
            y,
            (x_max.max(0.0) as u32 - x) + 1,
            (y_max.max(0.0) as u32 - y) + 1,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f32) -> Polygon {
        Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(side, 0.0),
            Point::new(side, side),
            Point::new(0.0, side),
        ])
    }

    #[test]
    fn test_area_and_perimeter() {
        let sq = square(10.0);
        assert_eq!(sq.area(), 100.0);
        assert_eq!(sq.perimeter(), 40.0);
        assert!((sq.roundness() - PI / 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_polygons_have_zero_roundness() {
        assert_eq!(Polygon::new(vec![]).roundness(), 0.0);
        assert_eq!(Polygon::new(vec![Point::new(3.0, 3.0)]).roundness(), 0.0);
        let line = Polygon::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert_eq!(line.area(), 0.0);
        assert_eq!(line.roundness(), 0.0);
    }

    #[test]
    fn test_polygonal_circle_is_nearly_round() {
        let points = (0..64)
            .map(|i| {
                let t = i as f32 / 64.0 * 2.0 * PI;
                Point::new(50.0 + 20.0 * t.cos(), 50.0 + 20.0 * t.sin())
            })
            .collect();
        assert!(Polygon::new(points).roundness() > 0.99);
    }

    #[test]
    fn test_bounding_rect_is_inclusive() {
        let rect = square(9.0).bounding_rect().unwrap();
        assert_eq!(rect, Rect::new(0, 0, 10, 10));
        assert!(Polygon::new(vec![]).bounding_rect().is_none());
    }

    #[test]
    fn test_pad_clamped() {
        let rect = Rect::new(5, 5, 10, 10);
        assert_eq!(rect.pad_clamped(3, 100, 100), Rect::new(2, 2, 16, 16));
        assert_eq!(rect.pad_clamped(10, 18, 40), Rect::new(0, 0, 18, 25));
        assert!(Rect::new(0, 0, 18, 40).covers(18, 40));
    }
}
