//! Team badge pill.

use serde::Serialize;
use storykit_story_model::{CanvasSpec, Metrics, PixelBox};

use crate::style::StoryStyle;
use crate::text::TextMeasure;

/// `EQUIPE · N` pill anchored to the top-right safe corner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamBadge {
    pub bounds: PixelBox,
    pub text: String,
    pub font_px: f32,
}

/// Badge for team sessions; `None` below two participants.
///
/// Placement ignores the selected layout.
pub fn team_badge(
    metrics: &Metrics,
    canvas: &CanvasSpec,
    style: &StoryStyle,
    measure: &dyn TextMeasure,
) -> Option<TeamBadge> {
    if !metrics.shows_team_badge() {
        return None;
    }
    let text = format!("EQUIPE · {}", metrics.team_count);
    let w = (measure.text_width(&text, style.badge_px) + 2.0 * style.badge_padding)
        .min(canvas.safe_width());
    Some(TeamBadge {
        bounds: PixelBox::new(canvas.safe_right() - w, canvas.safe_top, w, style.badge_height),
        text,
        font_px: style.badge_px,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::MonospaceMeasure;

    #[test]
    fn test_badge_anchors_top_right() {
        let metrics = Metrics {
            title: String::new(),
            date: String::new(),
            volume: 0.0,
            total_time: 0.0,
            kcal: 0.0,
            team_count: 4,
        };
        let badge = team_badge(
            &metrics,
            &CanvasSpec::STORY,
            &StoryStyle::default(),
            &MonospaceMeasure::default(),
        )
        .unwrap();
        assert_eq!(badge.bounds.y, 250.0);
        assert!((badge.bounds.right() - 990.0).abs() < 1e-3);
        assert!(badge.bounds.w > 48.0);
    }
}
