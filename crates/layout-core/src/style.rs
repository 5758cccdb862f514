//! Typographic and spacing constants of the story overlay.
//!
//! Values are in output pixels for the 1080-wide story canvas.

use serde::Serialize;

/// Wordmark first run, drawn in white.
pub const BRAND_LEAD: &str = "IRON";
/// Wordmark second run, drawn in the accent color.
pub const BRAND_TAIL: &str = "TRACKS";
/// Fixed subtitle literal; the date is appended after a separator.
pub const SUBTITLE_LITERAL: &str = "RELATÓRIO DO TREINO";
/// Separator between subtitle literal and date.
pub const SUBTITLE_SEPARATOR: &str = " · ";
/// Hard cap on wrapped title lines.
pub const MAX_TITLE_LINES: usize = 2;

/// Sizes and gaps used by every layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StoryStyle {
    pub brand_px: f32,
    pub title_px: f32,
    /// Title line advance as a multiple of `title_px`.
    pub title_line_height: f32,
    pub subtitle_px: f32,
    /// Line advance for single-line texts, as a multiple of font size.
    pub line_height: f32,

    pub card_height: f32,
    pub card_gap: f32,
    pub card_radius: f32,
    /// Horizontal padding inside a card.
    pub card_padding: f32,
    pub card_label_px: f32,
    pub card_value_px: f32,
    pub card_value_min_px: f32,
    pub card_value_step_px: f32,

    pub gap_brand_title: f32,
    pub gap_title_subtitle: f32,
    pub gap_subtitle_cards: f32,

    pub badge_px: f32,
    pub badge_height: f32,
    pub badge_padding: f32,
}

impl Default for StoryStyle {
    fn default() -> Self {
        Self {
            brand_px: 44.0,
            title_px: 72.0,
            title_line_height: 1.05,
            subtitle_px: 30.0,
            line_height: 1.2,

            card_height: 150.0,
            card_gap: 24.0,
            card_radius: 28.0,
            card_padding: 16.0,
            card_label_px: 22.0,
            card_value_px: 52.0,
            card_value_min_px: 24.0,
            card_value_step_px: 2.0,

            gap_brand_title: 16.0,
            gap_title_subtitle: 12.0,
            gap_subtitle_cards: 28.0,

            badge_px: 26.0,
            badge_height: 56.0,
            badge_padding: 24.0,
        }
    }
}

impl StoryStyle {
    pub fn title_line_advance(&self) -> f32 {
        self.title_px * self.title_line_height
    }

    pub fn brand_height(&self) -> f32 {
        self.brand_px * self.line_height
    }

    pub fn subtitle_height(&self) -> f32 {
        self.subtitle_px * self.line_height
    }

    /// Width of one card in a three-card row filling `band` with two gaps.
    pub fn card_width(&self, band: f32) -> f32 {
        ((band - 2.0 * self.card_gap) / 3.0).max(0.0)
    }
}
