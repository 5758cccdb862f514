//! Check system capabilities.

use storykit_common::config::StoryConfig;
use storykit_render::encoder_selection::{available_encoders, resolve_codec};
use storykit_render::ffmpeg::command_exists;
use storykit_render::load_typeface;

pub fn run(config: &StoryConfig) -> anyhow::Result<()> {
    println!("StoryKit System Check");
    println!("{}", "=".repeat(50));

    let export = &config.export;
    let mut ready = true;

    for (name, binary) in [("ffmpeg", &export.ffmpeg), ("ffprobe", &export.ffprobe)] {
        if command_exists(binary) {
            println!("[OK] {name}: {}", binary.display());
        } else {
            println!("[MISSING] {name}: {} (video export unavailable)", binary.display());
            ready = false;
        }
    }

    if command_exists(&export.ffmpeg) {
        match available_encoders(&export.ffmpeg)
            .and_then(|encoders| resolve_codec(&encoders, export.reject_webm_output))
        {
            Ok(codec) => println!("[OK] Video encoder: {} ({})", codec.encoder(), codec.mime()),
            Err(e) => {
                println!("[MISSING] Video encoder: {e}");
                ready = false;
            }
        }
    }

    let typeface = load_typeface(&config.fonts);
    println!("[OK] Font: {}", typeface.name());

    println!();
    if ready {
        println!("All capabilities are available. StoryKit is ready.");
    } else {
        println!("Image export works; video export needs the missing tools above.");
    }
    Ok(())
}
