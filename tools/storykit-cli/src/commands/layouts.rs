//! List the layout catalogue.

use storykit_story_model::LAYOUT_OPTIONS;

pub fn run() -> anyhow::Result<()> {
    println!("Layouts:");
    for option in LAYOUT_OPTIONS {
        println!("  {:<12} {}", option.id.as_str(), option.label);
    }
    Ok(())
}
