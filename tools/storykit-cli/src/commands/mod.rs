pub mod check;
pub mod export_video;
pub mod layout;
pub mod layouts;
pub mod metrics;
pub mod render;

use std::path::{Path, PathBuf};

use storykit_common::config::StoryConfig;
use storykit_render::{load_typeface, StorySession};
use storykit_story_model::{LivePositions, SessionRecord};

/// Open a composition for `session` with the chosen layout and positions.
pub fn open_session(
    config: StoryConfig,
    session: &Path,
    layout: &str,
    positions: Option<PathBuf>,
) -> anyhow::Result<StorySession> {
    let record = SessionRecord::load(session)?;
    let typeface = load_typeface(&config.fonts);
    let story = StorySession::new(config, &record, typeface);
    story.set_layout(layout);

    if let Some(path) = positions {
        let json = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read positions {}: {e}", path.display()))?;
        let positions: LivePositions = serde_json::from_str(&json)
            .map_err(|e| anyhow::anyhow!("Invalid positions in {}: {e}", path.display()))?;
        story.set_positions(positions);
    }
    Ok(story)
}
