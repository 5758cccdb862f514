//! Fractional and pixel-space rectangles.
//!
//! Fractional coordinates are normalized: `(0.0, 0.0)` is the top-left and
//! `(1.0, 1.0)` the bottom-right corner of the output canvas.

use serde::{Deserialize, Serialize};

/// A normalized point: the top-left corner of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FracPoint {
    pub x: f64,
    pub y: f64,
}

/// A normalized size, as a fraction of canvas width/height.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FracSize {
    pub w: f64,
    pub h: f64,
}

/// An absolute box in output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl FracPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate by a fractional delta.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Clamp so a piece of `size` anchored here stays fully on the canvas:
    /// `0 ≤ x ≤ 1 − w` and `0 ≤ y ≤ 1 − h`.
    ///
    /// A piece wider or taller than the canvas pins to the origin on that axis.
    /// Non-finite inputs collapse to the origin.
    pub fn clamped(&self, size: FracSize) -> Self {
        Self {
            x: clamp_axis(self.x, size.w),
            y: clamp_axis(self.y, size.h),
        }
    }
}

fn clamp_axis(pos: f64, extent: f64) -> f64 {
    let extent = if extent.is_finite() { extent.max(0.0) } else { 0.0 };
    let max = (1.0 - extent).max(0.0);
    if pos.is_finite() {
        pos.clamp(0.0, max)
    } else {
        0.0
    }
}

impl FracSize {
    pub const fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }

    /// Fractional size of a pixel extent on a canvas.
    pub fn from_pixels(w: f32, h: f32, canvas_w: u32, canvas_h: u32) -> Self {
        Self {
            w: w as f64 / canvas_w.max(1) as f64,
            h: h as f64 / canvas_h.max(1) as f64,
        }
    }
}

impl PixelBox {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f32 {
        self.x + self.w / 2.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f32 {
        self.y + self.h / 2.0
    }

    /// Place a box of `size` at a fractional position on a canvas.
    pub fn from_frac(pos: FracPoint, size: FracSize, canvas_w: u32, canvas_h: u32) -> Self {
        Self {
            x: (pos.x * canvas_w as f64) as f32,
            y: (pos.y * canvas_h as f64) as f32,
            w: (size.w * canvas_w as f64) as f32,
            h: (size.h * canvas_h as f64) as f32,
        }
    }

    /// Check whether this box lies inside `outer` (edges inclusive, with a
    /// small tolerance for float rounding).
    pub fn is_within(&self, outer: &PixelBox) -> bool {
        const EPS: f32 = 0.01;
        self.x >= outer.x - EPS
            && self.y >= outer.y - EPS
            && self.right() <= outer.right() + EPS
            && self.bottom() <= outer.bottom() + EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clamp_pulls_piece_back_on_canvas() {
        let pos = FracPoint::new(1.4, 0.95).clamped(FracSize::new(0.3, 0.1));
        assert!((pos.x - 0.7).abs() < 1e-9);
        assert!((pos.y - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_negative_goes_to_zero() {
        let pos = FracPoint::new(-0.2, -3.0).clamped(FracSize::new(0.5, 0.5));
        assert_eq!(pos, FracPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_oversized_piece_pins_to_origin() {
        let pos = FracPoint::new(0.4, 0.4).clamped(FracSize::new(1.5, 0.2));
        assert_eq!(pos.x, 0.0);
        assert!((pos.y - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_nan_position_collapses() {
        let pos = FracPoint::new(f64::NAN, 0.5).clamped(FracSize::new(0.1, 0.1));
        assert_eq!(pos.x, 0.0);
    }

    #[test]
    fn test_pixel_box_from_frac() {
        let b = PixelBox::from_frac(
            FracPoint::new(0.5, 0.25),
            FracSize::new(0.25, 0.1),
            1080,
            1920,
        );
        assert_eq!(b, PixelBox::new(540.0, 480.0, 270.0, 192.0));
        assert_eq!(b.right(), 810.0);
        assert_eq!(b.center_x(), 675.0);
    }

    proptest! {
        #[test]
        fn prop_clamped_stays_on_canvas(
            x in -5.0f64..5.0,
            y in -5.0f64..5.0,
            w in 0.0f64..1.0,
            h in 0.0f64..1.0,
        ) {
            let p = FracPoint::new(x, y).clamped(FracSize::new(w, h));
            prop_assert!(p.x >= 0.0 && p.x <= 1.0 - w + 1e-12);
            prop_assert!(p.y >= 0.0 && p.y <= 1.0 - h + 1e-12);
        }
    }
}
