//! Cover-fit scaling and pixmap conversion helpers.

use serde::Serialize;
use storykit_common::error::{StoryError, StoryResult};
use tiny_skia::{FilterQuality, IntSize, Pixmap, PixmapPaint, PixmapRef, Transform};

/// Destination rectangle that covers the canvas while keeping aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverFit {
    pub dx: f32,
    pub dy: f32,
    pub dw: f32,
    pub dh: f32,
}

/// Scale an image to cover `canvas_w × canvas_h`, centered, cropping overflow.
///
/// Always `dw ≥ canvas_w` and `dh ≥ canvas_h`. A degenerate image size is
/// stretched over the canvas.
pub fn fit_cover(image_w: f32, image_h: f32, canvas_w: f32, canvas_h: f32) -> CoverFit {
    if !(image_w > 0.0 && image_h > 0.0 && image_w.is_finite() && image_h.is_finite()) {
        return CoverFit {
            dx: 0.0,
            dy: 0.0,
            dw: canvas_w,
            dh: canvas_h,
        };
    }
    let scale = (canvas_w / image_w).max(canvas_h / image_h);
    // Rounding can leave the product a hair short of the canvas.
    let dw = (image_w * scale).max(canvas_w);
    let dh = (image_h * scale).max(canvas_h);
    CoverFit {
        dx: (canvas_w - dw) / 2.0,
        dy: (canvas_h - dh) / 2.0,
        dw,
        dh,
    }
}

/// Draw `image` cover-fit over the whole surface with bilinear filtering.
pub fn draw_cover(surface: &mut Pixmap, image: PixmapRef<'_>) {
    let (iw, ih) = (image.width() as f32, image.height() as f32);
    let fit = fit_cover(iw, ih, surface.width() as f32, surface.height() as f32);
    let transform = Transform::from_row(fit.dw / iw, 0.0, 0.0, fit.dh / ih, fit.dx, fit.dy);

    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    surface.draw_pixmap(0, 0, image, &paint, transform, None);
}

/// Build a pixmap from straight (non-premultiplied) RGBA bytes.
pub fn pixmap_from_rgba(width: u32, height: u32, mut rgba: Vec<u8>) -> StoryResult<Pixmap> {
    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| StoryError::decode(format!("invalid frame size {width}x{height}")))?;
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(StoryError::decode(format!(
            "frame has {} bytes, expected {expected}",
            rgba.len()
        )));
    }
    premultiply_rgba_in_place(&mut rgba);
    Pixmap::from_vec(rgba, size)
        .ok_or_else(|| StoryError::decode("failed to allocate pixmap"))
}

/// Straight RGBA bytes of a pixmap, as encoders expect them.
pub fn pixmap_to_rgba(pixmap: &Pixmap) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

fn premultiply_rgba_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_landscape_image_is_cropped_horizontally() {
        let fit = fit_cover(1920.0, 1080.0, 1080.0, 1920.0);
        assert!((fit.dh - 1920.0).abs() < 1e-3);
        assert!(fit.dw > 1080.0);
        assert!(fit.dx < 0.0);
        assert!((fit.dx * 2.0 + fit.dw - 1080.0).abs() < 1e-3);
        assert_eq!(fit.dy, 0.0);
    }

    #[test]
    fn test_zero_sized_image_stretches() {
        let fit = fit_cover(0.0, 10.0, 1080.0, 1920.0);
        assert_eq!((fit.dx, fit.dy, fit.dw, fit.dh), (0.0, 0.0, 1080.0, 1920.0));
    }

    #[test]
    fn test_rgba_round_trip_keeps_opaque_pixels() {
        let rgba = vec![10, 20, 30, 255, 200, 100, 50, 255];
        let pixmap = pixmap_from_rgba(2, 1, rgba.clone()).unwrap();
        assert_eq!(pixmap_to_rgba(&pixmap), rgba);
    }

    #[test]
    fn test_wrong_buffer_length_is_rejected() {
        assert!(pixmap_from_rgba(2, 2, vec![0; 3]).is_err());
        assert!(pixmap_from_rgba(0, 2, Vec::new()).is_err());
    }

    #[test]
    fn test_draw_cover_fills_every_pixel() {
        let mut image = Pixmap::new(4, 2).unwrap();
        image.fill(tiny_skia::Color::from_rgba8(255, 0, 0, 255));
        let mut surface = Pixmap::new(9, 16).unwrap();
        draw_cover(&mut surface, image.as_ref());
        assert!(surface.pixels().iter().all(|p| p.alpha() > 0));
    }

    proptest! {
        #[test]
        fn prop_cover_always_covers(
            iw in 1.0f32..8000.0,
            ih in 1.0f32..8000.0,
        ) {
            let fit = fit_cover(iw, ih, 1080.0, 1920.0);
            prop_assert!(fit.dw >= 1080.0);
            prop_assert!(fit.dh >= 1920.0);
            prop_assert!(fit.dx <= 0.0);
            prop_assert!(fit.dy <= 0.0);
        }
    }
}
