//! Render a story image.

use std::path::PathBuf;

use storykit_common::config::StoryConfig;
use storykit_render::ImageFormat;
use storykit_story_model::MediaFile;

pub async fn run(
    config: StoryConfig,
    session: PathBuf,
    media: Option<PathBuf>,
    layout: String,
    positions: Option<PathBuf>,
    format: ImageFormat,
    output: PathBuf,
) -> anyhow::Result<()> {
    let story = super::open_session(config, &session, &layout, positions)?;
    println!("Rendering story for: {}", session.display());
    println!("  Layout: {} ({})", story.layout_id(), story.layout_id().label());

    if let Some(path) = media {
        if let Some(outcome) = story.select_media(MediaFile::new(path)).await? {
            if let Some(advisory) = outcome.advisory {
                println!("  [WARN] {}", advisory.message());
            }
            if outcome.source.image().is_none() {
                println!("  [WARN] Background is a video; use export-video to render it");
            }
        }
    }

    let result = story.export_image(format)?;
    let path = result.write_to_dir(&output)?;
    println!("Story saved: {} ({}, {} bytes)", path.display(), result.mime, result.blob.len());
    story.close();
    Ok(())
}
