//! The story canvas renderer.
//!
//! [`render_story`] paints one complete frame: background, legibility
//! gradient, badge, brand, title, subtitle and the stat cards. It only
//! draws; every position comes from a precomputed [`StoryLayout`].

use storykit_common::error::{StoryError, StoryResult};
use storykit_layout::{StatCard, StoryLayout, TextAlign, TextBlock};
use storykit_story_model::PixelBox;
use tiny_skia::{
    Color, ColorU8, FillRule, GradientStop, LinearGradient, Paint, Path, PathBuilder, Pixmap,
    PixmapRef, Point, Rect, SpreadMode, Stroke, Transform,
};

use crate::cover::draw_cover;
use crate::typeface::Typeface;

/// Colors of the overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub accent: ColorU8,
    pub text: ColorU8,
    pub muted_text: ColorU8,
    pub card_fill: ColorU8,
    pub card_border: ColorU8,
    pub badge_text: ColorU8,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            accent: ColorU8::from_rgba(250, 204, 21, 255),
            text: ColorU8::from_rgba(255, 255, 255, 255),
            muted_text: ColorU8::from_rgba(255, 255, 255, 191),
            card_fill: ColorU8::from_rgba(0, 0, 0, 115),
            card_border: ColorU8::from_rgba(255, 255, 255, 46),
            badge_text: ColorU8::from_rgba(10, 10, 10, 255),
        }
    }
}

/// Everything needed to paint the overlay.
#[derive(Clone, Copy)]
pub struct StoryScene<'a> {
    pub layout: &'a StoryLayout,
    pub typeface: &'a dyn Typeface,
    pub palette: Palette,
}

impl<'a> StoryScene<'a> {
    pub fn new(layout: &'a StoryLayout, typeface: &'a dyn Typeface) -> Self {
        Self {
            layout,
            typeface,
            palette: Palette::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Paint only the overlay and the legibility gradient.
    pub transparent_background: bool,
    /// Draw over the existing surface contents.
    pub skip_clear: bool,
}

/// Paint a story frame onto `surface`.
pub fn render_story(
    surface: &mut Pixmap,
    background: Option<PixmapRef<'_>>,
    scene: &StoryScene<'_>,
    options: RenderOptions,
) {
    if !options.skip_clear {
        surface.fill(Color::TRANSPARENT);
    }

    if !options.transparent_background {
        surface.fill(Color::BLACK);
        match background {
            Some(image) => draw_cover(surface, image),
            None => draw_placeholder(surface),
        }
    }

    draw_legibility_gradient(surface);

    let palette = scene.palette;
    if let Some(badge) = &scene.layout.badge {
        let b = badge.bounds;
        if let Some(path) = rounded_rect(b, b.h / 2.0) {
            fill_path(surface, &path, palette.accent);
        }
        let text_w = scene.typeface.text_width(&badge.text, badge.font_px);
        let x = b.center_x() - text_w / 2.0;
        let y = b.y + (b.h - badge.font_px) / 2.0;
        scene
            .typeface
            .draw(surface, &badge.text, x, y, badge.font_px, palette.badge_text);
    }

    let brand = &scene.layout.brand;
    let (bx, by) = (brand.bounds.x, brand.bounds.y);
    scene
        .typeface
        .draw(surface, &brand.lead, bx, by, brand.font_px, palette.text);
    scene.typeface.draw(
        surface,
        &brand.tail,
        bx + brand.lead_width,
        by,
        brand.font_px,
        palette.accent,
    );

    draw_text_block(surface, scene.typeface, &scene.layout.title, palette.text);
    draw_text_block(surface, scene.typeface, &scene.layout.subtitle, palette.muted_text);

    for card in &scene.layout.cards {
        draw_card(surface, scene.typeface, card, scene.layout.style.card_radius, &palette);
    }
}

/// Allocate a surface of the layout's canvas size and render into it.
pub fn render_to_pixmap(
    background: Option<PixmapRef<'_>>,
    scene: &StoryScene<'_>,
    options: RenderOptions,
) -> StoryResult<Pixmap> {
    let canvas = scene.layout.canvas;
    let mut surface = Pixmap::new(canvas.width, canvas.height).ok_or_else(|| {
        StoryError::export(format!(
            "cannot allocate {}x{} surface",
            canvas.width, canvas.height
        ))
    })?;
    render_story(&mut surface, background, scene, options);
    Ok(surface)
}

fn draw_text_block(surface: &mut Pixmap, typeface: &dyn Typeface, block: &TextBlock, color: ColorU8) {
    for (i, line) in block.lines.iter().enumerate() {
        let y = block.bounds.y + i as f32 * block.line_advance;
        let x = match block.align {
            TextAlign::Left => block.bounds.x,
            TextAlign::Right => block.bounds.right() - typeface.text_width(line, block.font_px),
        };
        typeface.draw(surface, line, x, y, block.font_px, color);
    }
}

fn draw_card(
    surface: &mut Pixmap,
    typeface: &dyn Typeface,
    card: &StatCard,
    radius: f32,
    palette: &Palette,
) {
    let b = card.bounds;
    if let Some(path) = rounded_rect(b, radius) {
        fill_path(surface, &path, palette.card_fill);
        let mut paint = Paint::default();
        paint.set_color(to_color(palette.card_border));
        paint.anti_alias = true;
        let stroke = Stroke {
            width: 1.5,
            ..Stroke::default()
        };
        surface.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    let label_h = card.label_px * 1.2;
    let value_h = card.value_px * 1.2;
    let gap = 8.0;
    let top = b.y + (b.h - (label_h + gap + value_h)) / 2.0;

    let label_w = typeface.text_width(&card.label, card.label_px);
    typeface.draw(
        surface,
        &card.label,
        b.center_x() - label_w / 2.0,
        top,
        card.label_px,
        palette.muted_text,
    );

    let value_w = typeface.text_width(&card.value, card.value_px);
    typeface.draw(
        surface,
        &card.value,
        b.center_x() - value_w / 2.0,
        top + label_h + gap,
        card.value_px,
        palette.text,
    );
}

/// Dark-transparent-dark gradient over the lower 65% of the canvas.
fn draw_legibility_gradient(surface: &mut Pixmap) {
    let (w, h) = (surface.width() as f32, surface.height() as f32);
    let top = h * 0.35;
    let shader = LinearGradient::new(
        Point::from_xy(0.0, top),
        Point::from_xy(0.0, h),
        vec![
            GradientStop::new(0.0, Color::from_rgba8(0, 0, 0, 89)),
            GradientStop::new(0.35, Color::from_rgba8(0, 0, 0, 0)),
            GradientStop::new(1.0, Color::from_rgba8(0, 0, 0, 217)),
        ],
        SpreadMode::Pad,
        Transform::identity(),
    );
    let (Some(shader), Some(rect)) = (shader, Rect::from_xywh(0.0, top, w, h - top)) else {
        return;
    };
    let mut paint = Paint::default();
    paint.shader = shader;
    surface.fill_rect(rect, &paint, Transform::identity(), None);
}

/// Diagonal dark gradient shown when there is no background image.
fn draw_placeholder(surface: &mut Pixmap) {
    let (w, h) = (surface.width() as f32, surface.height() as f32);
    let shader = LinearGradient::new(
        Point::from_xy(0.0, 0.0),
        Point::from_xy(w, h),
        vec![
            GradientStop::new(0.0, Color::from_rgba8(38, 38, 38, 255)),
            GradientStop::new(1.0, Color::from_rgba8(10, 10, 10, 255)),
        ],
        SpreadMode::Pad,
        Transform::identity(),
    );
    let (Some(shader), Some(rect)) = (shader, Rect::from_xywh(0.0, 0.0, w, h)) else {
        return;
    };
    let mut paint = Paint::default();
    paint.shader = shader;
    surface.fill_rect(rect, &paint, Transform::identity(), None);
}

fn fill_path(surface: &mut Pixmap, path: &Path, color: ColorU8) {
    let mut paint = Paint::default();
    paint.set_color(to_color(color));
    paint.anti_alias = true;
    surface.fill_path(path, &paint, FillRule::Winding, Transform::identity(), None);
}

fn to_color(c: ColorU8) -> Color {
    Color::from_rgba8(c.red(), c.green(), c.blue(), c.alpha())
}

/// Rounded rectangle path; the radius is capped at half the shorter side.
fn rounded_rect(b: PixelBox, radius: f32) -> Option<Path> {
    if !(b.w > 0.0 && b.h > 0.0) {
        return None;
    }
    let r = radius.clamp(0.0, b.w.min(b.h) / 2.0);
    let (l, t, rt, bt) = (b.x, b.y, b.right(), b.bottom());

    let mut pb = PathBuilder::new();
    pb.move_to(l + r, t);
    pb.line_to(rt - r, t);
    pb.quad_to(rt, t, rt, t + r);
    pb.line_to(rt, bt - r);
    pb.quad_to(rt, bt, rt - r, bt);
    pb.line_to(l + r, bt);
    pb.quad_to(l, bt, l, bt - r);
    pb.line_to(l, t + r);
    pb.quad_to(l, t, l + r, t);
    pb.close();
    pb.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeface::BlockTypeface;
    use storykit_layout::{compute_layout, MonospaceMeasure, StoryStyle};
    use storykit_story_model::{CanvasSpec, Layout, Metrics};

    fn story() -> StoryLayout {
        let metrics = Metrics {
            title: "Treino A".to_string(),
            date: "05/03/2024".to_string(),
            volume: 4_200.0,
            total_time: 2_400.0,
            kcal: 202.0,
            team_count: 2,
        };
        compute_layout(
            &Layout::BottomRow,
            &metrics,
            &CanvasSpec::STORY,
            &StoryStyle::default(),
            &MonospaceMeasure::default(),
        )
    }

    #[test]
    fn test_opaque_render_without_background_fills_canvas() {
        let layout = story();
        let face = BlockTypeface::default();
        let scene = StoryScene::new(&layout, &face);
        let surface = render_to_pixmap(None, &scene, RenderOptions::default()).unwrap();
        assert_eq!((surface.width(), surface.height()), (1080, 1920));
        assert!(surface.pixels().iter().all(|p| p.alpha() == 255));
    }

    #[test]
    fn test_transparent_render_keeps_background_clear() {
        let layout = story();
        let face = BlockTypeface::default();
        let scene = StoryScene::new(&layout, &face);
        let options = RenderOptions {
            transparent_background: true,
            skip_clear: false,
        };
        let surface = render_to_pixmap(None, &scene, options).unwrap();
        // Above the gradient and away from the badge nothing is painted.
        assert_eq!(surface.pixel(20, 20).map(|p| p.alpha()), Some(0));
        // Card panels are painted.
        let card = layout.cards[0].bounds;
        let px = surface
            .pixel((card.x + 4.0) as u32, card.center_y() as u32)
            .unwrap();
        assert!(px.alpha() > 0);
    }

    #[test]
    fn test_skip_clear_preserves_existing_pixels() {
        let layout = story();
        let face = BlockTypeface::default();
        let scene = StoryScene::new(&layout, &face);
        let mut surface = Pixmap::new(1080, 1920).unwrap();
        surface.fill(Color::from_rgba8(0, 0, 255, 255));
        render_story(
            &mut surface,
            None,
            &scene,
            RenderOptions {
                transparent_background: true,
                skip_clear: true,
            },
        );
        let top = surface.pixel(20, 20).unwrap();
        assert_eq!((top.blue(), top.alpha()), (255, 255));
    }

    #[test]
    fn test_background_is_drawn_cover_fit() {
        let layout = story();
        let face = BlockTypeface::default();
        let scene = StoryScene::new(&layout, &face);
        let mut bg = Pixmap::new(16, 9).unwrap();
        bg.fill(Color::from_rgba8(0, 200, 0, 255));
        let surface = render_to_pixmap(Some(bg.as_ref()), &scene, RenderOptions::default()).unwrap();
        let top = surface.pixel(5, 5).unwrap();
        assert!(top.green() > 150);
    }

    #[test]
    fn test_rounded_rect_rejects_empty_box() {
        assert!(rounded_rect(PixelBox::new(0.0, 0.0, 0.0, 10.0), 4.0).is_none());
        assert!(rounded_rect(PixelBox::new(0.0, 0.0, 10.0, 10.0), 40.0).is_some());
    }
}
