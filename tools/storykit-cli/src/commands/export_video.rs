//! Export a story video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use storykit_common::config::StoryConfig;
use storykit_render::{require_completed, ExportProgress, ExportStage, ProgressCallback};
use storykit_story_model::MediaFile;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: StoryConfig,
    session: PathBuf,
    media: PathBuf,
    start: Option<f64>,
    end: Option<f64>,
    layout: String,
    positions: Option<PathBuf>,
    output: PathBuf,
) -> anyhow::Result<()> {
    let story = Arc::new(super::open_session(config, &session, &layout, positions)?);
    println!("Exporting story video for: {}", session.display());

    let Some(outcome) = story.select_media(MediaFile::new(&media)).await? else {
        anyhow::bail!("Media load was superseded");
    };
    if let Some(advisory) = outcome.advisory {
        println!("  [WARN] {}", advisory.message());
    }

    let trim = match (start, end, story.trim()) {
        (_, _, None) => anyhow::bail!("{} is not a video", media.display()),
        (None, None, Some(trim)) => trim,
        (s, e, Some(trim)) => story
            .set_trim(s.unwrap_or(trim.start()), e.unwrap_or(trim.end()))
            .unwrap_or(trim),
    };
    println!("  Layout: {}", story.layout_id());
    println!(
        "  Trim: {:.2}s – {:.2}s of {:.2}s",
        trim.start(),
        trim.end(),
        trim.duration()
    );

    let canceller = story.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel_export();
        }
    });

    let progress: ProgressCallback = Box::new(print_progress);
    let result = require_completed(story.export_video(Some(progress)).await);
    ctrl_c.abort();
    println!();

    match result {
        Ok(result) => {
            let path = result.write_to_dir(&output)?;
            println!("Export complete: {} ({})", path.display(), result.mime);
        }
        Err(e) if e.is_user_cancellation() => println!("Export cancelled"),
        Err(e) => {
            println!("Export failed: {}", e.user_message());
            story.close();
            return Err(e.into());
        }
    }
    story.close();
    Ok(())
}

fn print_progress(p: ExportProgress) {
    if p.stage != ExportStage::Rendering {
        tracing::debug!(stage = ?p.stage, "Export stage");
        return;
    }
    print!(
        "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
        p.progress * 100.0,
        p.frames_rendered,
        p.total_frames,
        p.eta_secs,
    );
    let _ = std::io::stdout().flush();
}
