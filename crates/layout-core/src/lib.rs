//! StoryKit Layout Engine
//!
//! Turns metrics plus a layout choice into absolute pixel boxes:
//! - **Text:** Measurement seam, two-line title wrapping, auto-shrinking card values
//! - **Placement:** One placement formula per fixed layout, anchored to the safe zone
//! - **Live:** Measured piece sizes and size-aware clamping of user positions
//! - **Badge:** Team pill in the top-right safe corner
//! - **Drag:** Single-pointer drag state machine for the live layout
//!
//! This crate is pure computation: it does no I/O and no rasterization.
//! Text measurement is injected through [`TextMeasure`].

pub mod badge;
pub mod drag;
pub mod live;
pub mod placement;
pub mod style;
pub mod text;

pub use badge::{team_badge, TeamBadge};
pub use drag::{ContainerSize, DragController, DragState, NoCapture, PointerCapture, ScreenPoint};
pub use live::{piece_sizes, PieceSizes};
pub use placement::{
    compute_layout, subtitle_text, BrandMark, StatCard, StoryLayout, TextAlign, TextBlock,
};
pub use style::StoryStyle;
pub use text::{fit_font_size, wrap_title, MonospaceMeasure, TextMeasure};
