//! Typefaces: text measurement plus glyph rasterization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fontdue::{Font, FontSettings};
use storykit_common::config::FontConfig;
use storykit_common::error::{StoryError, StoryResult};
use storykit_layout::{MonospaceMeasure, TextMeasure};
use tiny_skia::{ColorU8, Paint, Pixmap, PremultipliedColorU8, Rect, Transform};

/// Well-known bold sans-serif locations, probed in order.
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// A face the renderer can measure with and draw.
pub trait Typeface: TextMeasure + Send + Sync {
    fn name(&self) -> &str;

    /// Draw one line of `text` whose line box starts at `(x, y)`.
    fn draw(&self, surface: &mut Pixmap, text: &str, x: f32, y: f32, px: f32, color: ColorU8);
}

/// A TrueType/OpenType face rasterized with fontdue.
pub struct FontdueTypeface {
    font: Font,
    name: String,
}

impl std::fmt::Debug for FontdueTypeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontdueTypeface")
            .field("name", &self.name)
            .finish()
    }
}

impl FontdueTypeface {
    pub fn from_bytes(bytes: &[u8], name: impl Into<String>) -> StoryResult<Self> {
        let name = name.into();
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| StoryError::config(format!("invalid font {name}: {e}")))?;
        Ok(Self { font, name })
    }

    pub fn load(path: &Path) -> StoryResult<Self> {
        if !path.exists() {
            return Err(StoryError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, path.display().to_string())
    }
}

impl TextMeasure for FontdueTypeface {
    fn text_width(&self, text: &str, px: f32) -> f32 {
        text.chars()
            .map(|ch| self.font.metrics(ch, px).advance_width)
            .sum()
    }

    fn ascent(&self, px: f32) -> f32 {
        self.font
            .horizontal_line_metrics(px)
            .map(|m| m.ascent)
            .unwrap_or(px * 0.8)
    }
}

impl Typeface for FontdueTypeface {
    fn name(&self) -> &str {
        &self.name
    }

    fn draw(&self, surface: &mut Pixmap, text: &str, x: f32, y: f32, px: f32, color: ColorU8) {
        let baseline = (y + self.ascent(px)).round() as i32;
        let mut pen_x = x;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, px);
            let glyph_x = pen_x.round() as i32 + metrics.xmin;
            let glyph_y = baseline - (metrics.height as i32 + metrics.ymin);

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }
                    blend_pixel(surface, glyph_x + gx as i32, glyph_y + gy as i32, color, coverage);
                }
            }
            pen_x += metrics.advance_width;
        }
    }
}

/// Fixed-advance face that draws each glyph as a solid block.
///
/// Used when no font file is available so a story is still produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockTypeface {
    metrics: MonospaceMeasure,
}

impl TextMeasure for BlockTypeface {
    fn text_width(&self, text: &str, px: f32) -> f32 {
        self.metrics.text_width(text, px)
    }
}

impl Typeface for BlockTypeface {
    fn name(&self) -> &str {
        "block"
    }

    fn draw(&self, surface: &mut Pixmap, text: &str, x: f32, y: f32, px: f32, color: ColorU8) {
        let advance = px * self.metrics.advance_em;
        let cap_height = px * 0.7;
        let top = y + self.ascent(px) - cap_height;

        let mut paint = Paint::default();
        paint.set_color_rgba8(color.red(), color.green(), color.blue(), color.alpha());
        paint.anti_alias = false;

        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let left = x + i as f32 * advance + advance * 0.125;
            if let Some(rect) = Rect::from_xywh(left, top, advance * 0.75, cap_height) {
                surface.fill_rect(rect, &paint, Transform::identity(), None);
            }
        }
    }
}

/// Configured font, then system fonts, then [`BlockTypeface`].
pub fn load_typeface(config: &FontConfig) -> Arc<dyn Typeface> {
    if let Some(path) = &config.path {
        match FontdueTypeface::load(path) {
            Ok(face) => {
                tracing::info!(font = %path.display(), "Loaded configured font");
                return Arc::new(face);
            }
            Err(e) => {
                tracing::warn!(font = %path.display(), error = %e, "Configured font unusable");
            }
        }
    }

    let found = SYSTEM_FONT_PATHS
        .iter()
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .find_map(|p| FontdueTypeface::load(&p).ok());

    match found {
        Some(face) => {
            tracing::debug!(font = face.name(), "Loaded system font");
            Arc::new(face)
        }
        None => {
            tracing::warn!("No usable font found, falling back to block glyphs");
            Arc::new(BlockTypeface::default())
        }
    }
}

/// Source-over blend of `color` at `coverage` into one premultiplied pixel.
pub(crate) fn blend_pixel(surface: &mut Pixmap, x: i32, y: i32, color: ColorU8, coverage: u8) {
    if x < 0 || y < 0 || x as u32 >= surface.width() || y as u32 >= surface.height() {
        return;
    }
    let alpha = coverage as u32 * color.alpha() as u32 / 255;
    if alpha == 0 {
        return;
    }
    let inv = 255 - alpha;
    let idx = (y as u32 * surface.width() + x as u32) as usize;
    let pixels = surface.pixels_mut();
    let dst = pixels[idx];

    let mix = |src: u8, dst: u8| ((src as u32 * alpha + dst as u32 * inv + 127) / 255) as u8;
    let out = PremultipliedColorU8::from_rgba(
        mix(color.red(), dst.red()),
        mix(color.green(), dst.green()),
        mix(color.blue(), dst.blue()),
        mix(255, dst.alpha()),
    );
    if let Some(out) = out {
        pixels[idx] = out;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_face_matches_monospace_metrics() {
        let face = BlockTypeface::default();
        assert_eq!(face.text_width("ABCD", 10.0), 24.0);
        assert_eq!(face.ascent(10.0), 8.0);
    }

    #[test]
    fn test_block_face_paints_inside_line_box() {
        let mut surface = Pixmap::new(100, 40).unwrap();
        BlockTypeface::default().draw(
            &mut surface,
            "I",
            10.0,
            5.0,
            20.0,
            ColorU8::from_rgba(255, 255, 255, 255),
        );
        let painted: Vec<(u32, u32)> = (0..40)
            .flat_map(|y| (0..100).map(move |x| (x, y)))
            .filter(|&(x, y)| surface.pixel(x, y).is_some_and(|p| p.alpha() > 0))
            .collect();
        assert!(!painted.is_empty());
        assert!(painted.iter().all(|&(x, y)| (10..22).contains(&x) && (5..25).contains(&y)));
    }

    #[test]
    fn test_blend_pixel_ignores_out_of_bounds() {
        let mut surface = Pixmap::new(4, 4).unwrap();
        let white = ColorU8::from_rgba(255, 255, 255, 255);
        blend_pixel(&mut surface, -1, 0, white, 255);
        blend_pixel(&mut surface, 4, 4, white, 255);
        blend_pixel(&mut surface, 1, 1, white, 128);
        let p = surface.pixel(1, 1).unwrap();
        assert_eq!(p.alpha(), 128);
        assert_eq!(p.red(), 128);
    }

    #[test]
    fn test_missing_font_falls_back_to_blocks() {
        let config = FontConfig {
            path: Some(PathBuf::from("/definitely/not/here.ttf")),
        };
        let face = load_typeface(&config);
        // Either a system font or the block fallback; never a panic.
        assert!(face.text_width("IRON", 44.0) > 0.0);
    }

    #[test]
    fn test_invalid_font_bytes_are_a_config_error() {
        let err = FontdueTypeface::from_bytes(b"not a font", "junk").unwrap_err();
        assert!(matches!(err, StoryError::Config { .. }));
    }
}
