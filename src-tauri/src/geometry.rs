//! Screen geometry for remote guidance
//!
//! The remote agent describes screen regions on a normalised 0-1000 scale,
//! independent of the device resolution. This module maps those boxes into
//! device pixels for the overlay surface, whose origin sits directly below
//! the system status bar.
//!
//! No clamping is performed: a box that lies partly above the visible area
//! after the inset is subtracted keeps its negative coordinates, and callers
//! are expected to tolerate off-screen or inverted boxes.

use serde::{Deserialize, Serialize};

/// Upper bound of the normalised coordinate space used by the remote agent
pub const NORMALISED_SCALE: f64 = 1000.0;

/// Physical screen dimensions captured once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenMetrics {
    /// Full screen width in pixels
    pub width_px: u32,
    /// Full screen height in pixels
    pub height_px: u32,
    /// Height of the system status bar in pixels
    pub top_inset_px: u32,
}

impl ScreenMetrics {
    pub fn new(width_px: u32, height_px: u32, top_inset_px: u32) -> Self {
        Self {
            width_px,
            height_px,
            top_inset_px,
        }
    }

    /// Height of the area below the status bar, where overlay surfaces live
    pub fn usable_height(&self) -> f64 {
        (self.height_px as f64 - self.top_inset_px as f64).max(0.0)
    }

    pub fn width(&self) -> f64 {
        self.width_px as f64
    }
}

/// A box on the remote agent's 0-1000 scale, as `[top, left, bottom, right]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalisedBox {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl NormalisedBox {
    pub fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }
}

/// A box in device pixels, relative to the overlay surface origin.
///
/// `right >= left` and `bottom >= top` are not guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelBox {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
}

impl PixelBox {
    pub fn new(top: i32, left: i32, bottom: i32, right: i32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Same region with its edges sorted, so inverted boxes collapse sensibly
    pub fn ordered(&self) -> PixelBox {
        PixelBox {
            top: self.top.min(self.bottom),
            left: self.left.min(self.right),
            bottom: self.top.max(self.bottom),
            right: self.left.max(self.right),
        }
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left as f64 + self.right as f64) / 2.0,
            (self.top as f64 + self.bottom as f64) / 2.0,
        )
    }

    pub fn to_rect(&self) -> Rect {
        let b = self.ordered();
        Rect::new(b.left as f64, b.top as f64, b.right as f64, b.bottom as f64)
    }
}

/// Convert a normalised box into overlay pixel coordinates.
///
/// `x = round(nx / 1000 * width)`, `y = round(ny / 1000 * height - inset)`.
pub fn to_pixel_box(normalised: &NormalisedBox, metrics: &ScreenMetrics) -> PixelBox {
    let map_x = |v: f64| (v / NORMALISED_SCALE * metrics.width_px as f64).round() as i32;
    let map_y = |v: f64| {
        (v / NORMALISED_SCALE * metrics.height_px as f64 - metrics.top_inset_px as f64).round()
            as i32
    };

    let pixel = PixelBox {
        top: map_y(normalised.top),
        left: map_x(normalised.left),
        bottom: map_y(normalised.bottom),
        right: map_x(normalised.right),
    };

    tracing::debug!("Mapped {:?} -> {:?} on {:?}", normalised, pixel, metrics);
    pixel
}

/// A point in overlay pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// An axis-aligned rectangle in overlay pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn inflate(&self, amount: f64) -> Rect {
        Rect::new(
            self.left - amount,
            self.top - amount,
            self.right + amount,
            self.bottom + amount,
        )
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone() -> ScreenMetrics {
        ScreenMetrics::new(1000, 2000, 0)
    }

    #[test]
    fn test_maps_reference_box() {
        let b = to_pixel_box(&NormalisedBox::new(100.0, 100.0, 200.0, 200.0), &phone());
        assert_eq!(b, PixelBox::new(200, 100, 400, 200));
    }

    #[test]
    fn test_inset_is_subtracted_from_vertical_edges() {
        let metrics = ScreenMetrics::new(1080, 2400, 96);
        let b = to_pixel_box(&NormalisedBox::new(500.0, 500.0, 500.0, 500.0), &metrics);
        assert_eq!(b.top, 1104);
        assert_eq!(b.bottom, 1104);
        assert_eq!(b.left, 540);
    }

    #[test]
    fn test_no_clamping_above_visible_area() {
        let metrics = ScreenMetrics::new(1080, 2400, 96);
        let b = to_pixel_box(&NormalisedBox::new(0.0, 0.0, 10.0, 10.0), &metrics);
        assert_eq!(b.top, -96);
        assert_eq!(b.bottom, -72);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let metrics = ScreenMetrics::new(1440, 3120, 120);
        let input = NormalisedBox::new(333.3, 12.5, 999.9, 875.0);
        assert_eq!(
            to_pixel_box(&input, &metrics),
            to_pixel_box(&input, &metrics)
        );
    }

    #[test]
    fn test_rounding() {
        // 1/1000 of 1080 = 1.08 -> 1; 5/1000 of 1080 = 5.4 -> 5; 7/1000 = 7.56 -> 8
        let metrics = ScreenMetrics::new(1080, 1000, 0);
        let b = to_pixel_box(&NormalisedBox::new(0.0, 1.0, 0.0, 7.0), &metrics);
        assert_eq!(b.left, 1);
        assert_eq!(b.right, 8);
    }

    #[test]
    fn test_inverted_box_is_tolerated() {
        let b = to_pixel_box(&NormalisedBox::new(300.0, 300.0, 100.0, 100.0), &phone());
        assert!(b.is_degenerate());
        let o = b.ordered();
        assert_eq!(o, PixelBox::new(200, 100, 600, 300));
        assert!(!o.is_degenerate());
    }

    #[test]
    fn test_zero_area_box_has_centre() {
        let b = PixelBox::new(50, 50, 50, 50);
        assert!(b.is_degenerate());
        assert_eq!(b.center(), Point::new(50.0, 50.0));
    }

    #[test]
    fn test_rect_helpers() {
        let r = Rect::new(10.0, 10.0, 20.0, 30.0);
        assert_eq!(r.inflate(5.0), Rect::new(5.0, 5.0, 25.0, 35.0));
        assert!(r.intersects(&Rect::new(15.0, 15.0, 40.0, 40.0)));
        assert!(!r.intersects(&Rect::new(20.0, 10.0, 40.0, 40.0)));
        assert_eq!(
            r.union(&Rect::new(0.0, 20.0, 15.0, 50.0)),
            Rect::new(0.0, 10.0, 20.0, 50.0)
        );
    }
}
