//! Show the statistics a story displays.

use std::path::PathBuf;

use storykit_story_model::{Metrics, SessionRecord};

pub fn run(session: PathBuf) -> anyhow::Result<()> {
    let record = SessionRecord::load(&session)?;
    let metrics = Metrics::from_session(&record);

    println!("Session: {}", session.display());
    println!("  Title: {}", metrics.title);
    println!(
        "  Date: {}",
        if metrics.date.is_empty() { "-" } else { metrics.date.as_str() }
    );
    println!("  Volume: {}", metrics.volume_label());
    println!("  Time: {}", metrics.time_label());
    println!("  Kcal: {}", metrics.kcal_label());
    println!(
        "  Team: {}{}",
        metrics.team_count,
        if metrics.shows_team_badge() { " (badge)" } else { "" }
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
