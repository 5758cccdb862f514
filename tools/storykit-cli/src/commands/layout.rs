//! Print the computed overlay boxes.

use std::path::PathBuf;

use storykit_common::config::StoryConfig;

pub fn run(
    config: StoryConfig,
    session: PathBuf,
    layout: String,
    positions: Option<PathBuf>,
) -> anyhow::Result<()> {
    let story = super::open_session(config, &session, &layout, positions)?;
    println!("{}", serde_json::to_string_pretty(&story.story_layout())?);
    Ok(())
}
