//! StoryKit Render Engine
//!
//! Turns a computed story layout into pixels and files: paints the overlay
//! over a photo or video background, loads media, drives the trim preview
//! and exports the finished story.
//!
//! # Pipeline Architecture
//!
//! ```text
//! photo.jpg ──── decode ──┐
//!                         ├── Cover fit ── Legibility gradient ── Overlay ── JPEG/PNG
//! StoryLayout ────────────┘
//!
//! clip.mp4 ── ffmpeg decode (trim) ──┐
//!                                    ├── per frame: black + cover fit + overlay
//! StoryLayout ───────────────────────┘                 │
//!                                                      ▼
//!                                     ffmpeg encode (H.264 or VP9)
//!                                                      │
//!                                                      ▼
//!                                                 ExportResult
//! ```
//!
//! [`StorySession`] ties the pieces together for one composition.

pub mod canvas;
pub mod compositor;
pub mod cover;
pub mod encoder_selection;
pub mod export;
pub mod ffmpeg;
pub mod media;
pub mod preview;
pub mod session;
pub mod typeface;

pub use canvas::{render_story, render_to_pixmap, Palette, RenderOptions, StoryScene};
pub use compositor::{FrameError, FrameSink, FrameSource, VideoCompositor};
pub use cover::{fit_cover, CoverFit};
pub use export::*;
pub use media::{LoadOutcome, MediaDecoder, MediaLoader, MediaSource};
pub use preview::{PlaybackSurface, SharedTrimController, TickOutcome, TrimController};
pub use session::StorySession;
pub use typeface::{load_typeface, BlockTypeface, FontdueTypeface, Typeface};
