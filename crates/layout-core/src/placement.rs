//! Fixed layout placement.
//!
//! Each catalogue layout has its own placement function. All of them share
//! the same measured content, so switching layouts never changes text or
//! card sizes, only where the pieces go.

use serde::Serialize;
use storykit_story_model::{CanvasSpec, Layout, LayoutId, LivePositions, Metrics, PieceKey, PixelBox};

use crate::badge::{team_badge, TeamBadge};
use crate::style::{StoryStyle, BRAND_LEAD, BRAND_TAIL, SUBTITLE_LITERAL, SUBTITLE_SEPARATOR};
use crate::text::{fit_font_size, wrap_title, TextMeasure};

/// Horizontal anchoring of text inside its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Right,
}

/// One or more lines of text occupying `bounds`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    pub bounds: PixelBox,
    pub lines: Vec<String>,
    pub font_px: f32,
    /// Distance between consecutive baselines.
    pub line_advance: f32,
    pub align: TextAlign,
}

/// The two-run wordmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandMark {
    pub bounds: PixelBox,
    pub lead: String,
    pub tail: String,
    /// Width of the lead run; the tail starts right after it.
    pub lead_width: f32,
    pub font_px: f32,
}

/// A statistic card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatCard {
    pub key: PieceKey,
    pub bounds: PixelBox,
    pub label: String,
    pub value: String,
    pub label_px: f32,
    /// Auto-shrunk so the value fits between the card paddings.
    pub value_px: f32,
}

/// Every overlay piece in absolute output pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryLayout {
    pub layout: LayoutId,
    pub canvas: CanvasSpec,
    pub style: StoryStyle,
    pub brand: BrandMark,
    pub title: TextBlock,
    pub subtitle: TextBlock,
    pub cards: Vec<StatCard>,
    pub badge: Option<TeamBadge>,
}

impl StoryLayout {
    /// Box of a movable piece.
    pub fn piece_box(&self, key: PieceKey) -> Option<PixelBox> {
        match key {
            PieceKey::Brand => Some(self.brand.bounds),
            PieceKey::Title => Some(self.title.bounds),
            PieceKey::Subtitle => Some(self.subtitle.bounds),
            card => self.cards.iter().find(|c| c.key == card).map(|c| c.bounds),
        }
    }
}

/// Card text before placement.
#[derive(Debug, Clone)]
pub(crate) struct CardContent {
    pub key: PieceKey,
    pub label: &'static str,
    pub value: String,
    pub value_px: f32,
}

/// Text and measured sizes shared by every layout.
#[derive(Debug, Clone)]
pub(crate) struct Content {
    pub brand_lead_w: f32,
    pub brand_w: f32,
    pub brand_h: f32,
    pub title_lines: Vec<String>,
    pub title_w: f32,
    pub title_h: f32,
    pub subtitle: String,
    pub subtitle_w: f32,
    pub subtitle_h: f32,
    pub card_w: f32,
    pub card_h: f32,
    pub cards: Vec<CardContent>,
}

pub(crate) fn card_label(key: PieceKey) -> &'static str {
    match key {
        PieceKey::CardVolume => "VOLUME",
        PieceKey::CardTempo => "TEMPO",
        PieceKey::CardKcal => "KCAL",
        _ => "",
    }
}

fn card_value(key: PieceKey, metrics: &Metrics) -> String {
    match key {
        PieceKey::CardVolume => metrics.volume_label(),
        PieceKey::CardTempo => metrics.time_label(),
        PieceKey::CardKcal => metrics.kcal_label(),
        _ => String::new(),
    }
}

/// `RELATÓRIO DO TREINO · 05/03/2024`, or the bare literal without a date.
pub fn subtitle_text(date: &str) -> String {
    if date.trim().is_empty() {
        SUBTITLE_LITERAL.to_string()
    } else {
        format!("{SUBTITLE_LITERAL}{SUBTITLE_SEPARATOR}{}", date.trim())
    }
}

impl Content {
    pub(crate) fn measure(
        metrics: &Metrics,
        canvas: &CanvasSpec,
        style: &StoryStyle,
        measure: &dyn TextMeasure,
    ) -> Self {
        let band = canvas.safe_width();

        let brand_lead_w = measure.text_width(BRAND_LEAD, style.brand_px);
        let brand_w = brand_lead_w + measure.text_width(BRAND_TAIL, style.brand_px);

        let title_lines = wrap_title(&metrics.title, band, style.title_px, measure);
        let title_w = title_lines
            .iter()
            .map(|line| measure.text_width(line, style.title_px))
            .fold(0.0f32, f32::max);
        let title_h = title_lines.len().max(1) as f32 * style.title_line_advance();

        let subtitle = subtitle_text(&metrics.date);
        let subtitle_w = measure.text_width(&subtitle, style.subtitle_px).min(band);

        let card_w = style.card_width(band);
        let interior = (card_w - 2.0 * style.card_padding).max(0.0);
        let cards = PieceKey::CARDS
            .into_iter()
            .map(|key| {
                let value = card_value(key, metrics);
                let value_px = fit_font_size(
                    &value,
                    interior,
                    style.card_value_px,
                    style.card_value_min_px,
                    style.card_value_step_px,
                    measure,
                );
                CardContent {
                    key,
                    label: card_label(key),
                    value,
                    value_px,
                }
            })
            .collect();

        Self {
            brand_lead_w,
            brand_w,
            brand_h: style.brand_height(),
            title_lines,
            title_w,
            title_h,
            subtitle,
            subtitle_w,
            subtitle_h: style.subtitle_height(),
            card_w,
            card_h: style.card_height,
            cards,
        }
    }

    /// Pixel size of a piece.
    pub(crate) fn size_of(&self, key: PieceKey) -> (f32, f32) {
        match key {
            PieceKey::Brand => (self.brand_w, self.brand_h),
            PieceKey::Title => (self.title_w, self.title_h),
            PieceKey::Subtitle => (self.subtitle_w, self.subtitle_h),
            _ => (self.card_w, self.card_h),
        }
    }

    fn brand(&self, x: f32, y: f32, style: &StoryStyle) -> BrandMark {
        BrandMark {
            bounds: PixelBox::new(x, y, self.brand_w, self.brand_h),
            lead: BRAND_LEAD.to_string(),
            tail: BRAND_TAIL.to_string(),
            lead_width: self.brand_lead_w,
            font_px: style.brand_px,
        }
    }

    fn title(&self, x: f32, y: f32, align: TextAlign, style: &StoryStyle) -> TextBlock {
        TextBlock {
            bounds: PixelBox::new(x, y, self.title_w, self.title_h),
            lines: self.title_lines.clone(),
            font_px: style.title_px,
            line_advance: style.title_line_advance(),
            align,
        }
    }

    fn subtitle(&self, x: f32, y: f32, align: TextAlign, style: &StoryStyle) -> TextBlock {
        TextBlock {
            bounds: PixelBox::new(x, y, self.subtitle_w, self.subtitle_h),
            lines: vec![self.subtitle.clone()],
            font_px: style.subtitle_px,
            line_advance: style.subtitle_height(),
            align,
        }
    }

    fn card(&self, index: usize, bounds: PixelBox, style: &StoryStyle) -> Option<StatCard> {
        self.cards.get(index).map(|content| StatCard {
            key: content.key,
            bounds,
            label: content.label.to_string(),
            value: content.value.clone(),
            label_px: style.card_label_px,
            value_px: content.value_px,
        })
    }
}

/// Compute every overlay box for `layout`.
pub fn compute_layout(
    layout: &Layout,
    metrics: &Metrics,
    canvas: &CanvasSpec,
    style: &StoryStyle,
    measure: &dyn TextMeasure,
) -> StoryLayout {
    let content = Content::measure(metrics, canvas, style, measure);
    let placed = match layout {
        Layout::BottomRow => place_bottom_row(&content, canvas, style),
        Layout::TopRow => place_top_row(&content, canvas, style),
        Layout::LeftStack => place_stack(&content, canvas, style, TextAlign::Left),
        Layout::RightStack => place_stack(&content, canvas, style, TextAlign::Right),
        Layout::Live(positions) => place_live(&content, canvas, style, positions),
    };

    tracing::trace!(
        layout = %layout.id(),
        title_lines = content.title_lines.len(),
        card_width = content.card_w,
        "Computed story layout"
    );

    StoryLayout {
        layout: layout.id(),
        canvas: *canvas,
        style: *style,
        brand: placed.brand,
        title: placed.title,
        subtitle: placed.subtitle,
        cards: placed.cards,
        badge: team_badge(metrics, canvas, style, measure),
    }
}

struct Placed {
    brand: BrandMark,
    title: TextBlock,
    subtitle: TextBlock,
    cards: Vec<StatCard>,
}

/// Brand, title and subtitle stacked upward so the subtitle's bottom edge
/// sits `gap_subtitle_cards` above `anchor_y`.
fn stack_text_above(
    content: &Content,
    style: &StoryStyle,
    anchor_y: f32,
    x_for: impl Fn(f32) -> f32,
    align: TextAlign,
) -> (BrandMark, TextBlock, TextBlock) {
    let subtitle_y = anchor_y - style.gap_subtitle_cards - content.subtitle_h;
    let title_y = subtitle_y - style.gap_title_subtitle - content.title_h;
    let brand_y = title_y - style.gap_brand_title - content.brand_h;
    (
        content.brand(x_for(content.brand_w), brand_y, style),
        content.title(x_for(content.title_w), title_y, align, style),
        content.subtitle(x_for(content.subtitle_w), subtitle_y, align, style),
    )
}

fn card_row(content: &Content, canvas: &CanvasSpec, style: &StoryStyle, y: f32) -> Vec<StatCard> {
    (0..content.cards.len())
        .filter_map(|i| {
            let x = canvas.safe_left() + i as f32 * (content.card_w + style.card_gap);
            content.card(i, PixelBox::new(x, y, content.card_w, content.card_h), style)
        })
        .collect()
}

fn place_bottom_row(content: &Content, canvas: &CanvasSpec, style: &StoryStyle) -> Placed {
    let cards_y = canvas.safe_bottom_edge() - content.card_h;
    let left = canvas.safe_left();
    let (brand, title, subtitle) =
        stack_text_above(content, style, cards_y, |_| left, TextAlign::Left);
    Placed {
        brand,
        title,
        subtitle,
        cards: card_row(content, canvas, style, cards_y),
    }
}

fn place_top_row(content: &Content, canvas: &CanvasSpec, style: &StoryStyle) -> Placed {
    let x = canvas.safe_left();
    let brand_y = canvas.safe_top;
    let title_y = brand_y + content.brand_h + style.gap_brand_title;
    let subtitle_y = title_y + content.title_h + style.gap_title_subtitle;
    let cards_y = subtitle_y + content.subtitle_h + style.gap_subtitle_cards;
    Placed {
        brand: content.brand(x, brand_y, style),
        title: content.title(x, title_y, TextAlign::Left, style),
        subtitle: content.subtitle(x, subtitle_y, TextAlign::Left, style),
        cards: card_row(content, canvas, style, cards_y),
    }
}

fn place_stack(
    content: &Content,
    canvas: &CanvasSpec,
    style: &StoryStyle,
    align: TextAlign,
) -> Placed {
    let count = content.cards.len() as f32;
    let stack_h = count * content.card_h + (count - 1.0).max(0.0) * style.card_gap;
    let stack_top = canvas.safe_bottom_edge() - stack_h;
    let card_x = match align {
        TextAlign::Left => canvas.safe_left(),
        TextAlign::Right => canvas.safe_right() - content.card_w,
    };

    let cards = (0..content.cards.len())
        .filter_map(|i| {
            let y = stack_top + i as f32 * (content.card_h + style.card_gap);
            content.card(i, PixelBox::new(card_x, y, content.card_w, content.card_h), style)
        })
        .collect();

    let left = canvas.safe_left();
    let right = canvas.safe_right();
    let (brand, title, subtitle) = match align {
        TextAlign::Left => stack_text_above(content, style, stack_top, |_| left, align),
        TextAlign::Right => stack_text_above(content, style, stack_top, |w| right - w, align),
    };

    Placed {
        brand,
        title,
        subtitle,
        cards,
    }
}

fn place_live(
    content: &Content,
    canvas: &CanvasSpec,
    style: &StoryStyle,
    positions: &LivePositions,
) -> Placed {
    let boxed = |key: PieceKey| crate::live::clamped_box(content, canvas, positions, key);

    let brand_box = boxed(PieceKey::Brand);
    let title_box = boxed(PieceKey::Title);
    let subtitle_box = boxed(PieceKey::Subtitle);

    let cards = PieceKey::CARDS
        .into_iter()
        .enumerate()
        .filter_map(|(i, key)| content.card(i, boxed(key), style))
        .collect();

    Placed {
        brand: content.brand(brand_box.x, brand_box.y, style),
        title: content.title(title_box.x, title_box.y, TextAlign::Left, style),
        subtitle: content.subtitle(subtitle_box.x, subtitle_box.y, TextAlign::Left, style),
        cards,
    }
}
