//! Output canvas geometry and the safe zone.

use serde::{Deserialize, Serialize};
use storykit_common::config::CanvasConfig;

use crate::geometry::PixelBox;

/// Story output width in pixels.
pub const STORY_WIDTH: u32 = 1080;
/// Story output height in pixels.
pub const STORY_HEIGHT: u32 = 1920;
/// Safe margin below the top edge.
pub const SAFE_TOP: f32 = 250.0;
/// Safe margin above the bottom edge.
pub const SAFE_BOTTOM: f32 = 420.0;
/// Safe margin on the left and right edges.
pub const SAFE_SIDE: f32 = 90.0;

/// Canvas size plus the margins fixed layouts must respect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    pub safe_top: f32,
    pub safe_bottom: f32,
    pub safe_side: f32,
}

impl CanvasSpec {
    /// The 1080×1920 story canvas.
    pub const STORY: CanvasSpec = CanvasSpec {
        width: STORY_WIDTH,
        height: STORY_HEIGHT,
        safe_top: SAFE_TOP,
        safe_bottom: SAFE_BOTTOM,
        safe_side: SAFE_SIDE,
    };

    pub fn width_f(&self) -> f32 {
        self.width as f32
    }

    pub fn height_f(&self) -> f32 {
        self.height as f32
    }

    /// Width of the horizontal band between the side margins.
    pub fn safe_width(&self) -> f32 {
        (self.width_f() - 2.0 * self.safe_side).max(0.0)
    }

    /// Left edge of the safe zone.
    pub fn safe_left(&self) -> f32 {
        self.safe_side
    }

    /// Right edge of the safe zone.
    pub fn safe_right(&self) -> f32 {
        self.width_f() - self.safe_side
    }

    /// Bottom edge of the safe zone, measured from the top.
    pub fn safe_bottom_edge(&self) -> f32 {
        self.height_f() - self.safe_bottom
    }

    /// The safe zone as a pixel box.
    pub fn safe_zone(&self) -> PixelBox {
        PixelBox::new(
            self.safe_side,
            self.safe_top,
            self.safe_width(),
            (self.safe_bottom_edge() - self.safe_top).max(0.0),
        )
    }

    /// The whole canvas as a pixel box.
    pub fn bounds(&self) -> PixelBox {
        PixelBox::new(0.0, 0.0, self.width_f(), self.height_f())
    }
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self::STORY
    }
}

impl From<&CanvasConfig> for CanvasSpec {
    fn from(config: &CanvasConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            safe_top: config.safe_top,
            safe_bottom: config.safe_bottom,
            safe_side: config.safe_side,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_safe_zone() {
        let zone = CanvasSpec::STORY.safe_zone();
        assert_eq!(zone, PixelBox::new(90.0, 250.0, 900.0, 1250.0));
        assert_eq!(CanvasSpec::STORY.safe_bottom_edge(), 1500.0);
    }

    #[test]
    fn test_config_round_trip_matches_constants() {
        let spec = CanvasSpec::from(&CanvasConfig::default());
        assert_eq!(spec, CanvasSpec::STORY);
    }
}
