//! StoryKit Story Model
//!
//! Defines the data contracts of a workout story composition:
//! - **Session:** The opaque workout record supplied by the host
//! - **Metrics:** The fixed set of statistics shown on the story
//! - **Layouts:** The static layout catalogue and the live positions map
//! - **Media:** File classification and the video trim range
//!
//! Fractional coordinates are normalized to `[0.0, 1.0]` relative to the
//! output canvas so they survive preview scaling.

pub mod canvas;
pub mod geometry;
pub mod layout_option;
pub mod media;
pub mod metrics;
pub mod positions;
pub mod session;
pub mod trim;

pub use canvas::*;
pub use geometry::*;
pub use layout_option::*;
pub use media::*;
pub use metrics::*;
pub use positions::*;
pub use session::*;
pub use trim::*;
