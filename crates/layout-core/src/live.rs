//! Measured piece sizes and placement for the free-form layout.

use std::collections::BTreeMap;

use serde::Serialize;
use storykit_story_model::{CanvasSpec, FracSize, LivePositions, Metrics, PieceKey, PixelBox};

use crate::placement::Content;
use crate::style::StoryStyle;
use crate::text::TextMeasure;

/// Fractional size of every movable piece, as currently measured.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PieceSizes {
    sizes: BTreeMap<PieceKey, FracSize>,
}

impl PieceSizes {
    /// Size of a piece; unknown pieces are treated as points.
    pub fn get(&self, key: PieceKey) -> FracSize {
        self.sizes.get(&key).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PieceKey, FracSize)> + '_ {
        self.sizes.iter().map(|(k, v)| (*k, *v))
    }
}

impl FromIterator<(PieceKey, FracSize)> for PieceSizes {
    fn from_iter<I: IntoIterator<Item = (PieceKey, FracSize)>>(iter: I) -> Self {
        Self {
            sizes: iter.into_iter().collect(),
        }
    }
}

/// Measure every piece for the current metrics and typeface.
pub fn piece_sizes(
    metrics: &Metrics,
    canvas: &CanvasSpec,
    style: &StoryStyle,
    measure: &dyn TextMeasure,
) -> PieceSizes {
    let content = Content::measure(metrics, canvas, style, measure);
    sizes_of(&content, canvas)
}

pub(crate) fn sizes_of(content: &Content, canvas: &CanvasSpec) -> PieceSizes {
    PieceKey::ALL
        .into_iter()
        .map(|key| {
            let (w, h) = content.size_of(key);
            (key, FracSize::from_pixels(w, h, canvas.width, canvas.height))
        })
        .collect()
}

/// Pixel box of a piece at its stored position, clamped to stay on canvas.
pub(crate) fn clamped_box(
    content: &Content,
    canvas: &CanvasSpec,
    positions: &LivePositions,
    key: PieceKey,
) -> PixelBox {
    let (w, h) = content.size_of(key);
    let size = FracSize::from_pixels(w, h, canvas.width, canvas.height);
    let pos = positions.get(key).clamped(size);
    PixelBox::from_frac(pos, size, canvas.width, canvas.height)
}
