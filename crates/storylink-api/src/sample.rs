//! Startup story: loaded from disk or the built-in briefing.

use std::path::Path;

use storylink_narrative::application::content;
use storylink_narrative::domain::story::{DialogueLine, Scene, Story};
use tracing::info;

use crate::error::AppError;

/// Reads and validates a story file. Files ending in `.yaml` or `.yml` are
/// parsed as YAML, everything else as JSON.
///
/// # Errors
///
/// Returns `AppError::Story` if the file cannot be read or is not a valid
/// story.
pub fn load_story(path: &Path) -> Result<Story, AppError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| AppError::Story(format!("cannot read {}: {e}", path.display())))?;
    let yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    let story = if yaml {
        content::import_story_yaml(&source)
    } else {
        content::import_story_json(&source)
    }
    .map_err(|e| AppError::Story(format!("{}: {e}", path.display())))?;
    info!(path = %path.display(), scenes = story.scenes.len(), "Story loaded");
    Ok(story)
}

/// The story served when no file is configured.
#[must_use]
pub fn sample_story() -> Story {
    Story::new(vec![
        Scene::new(
            "Mission Briefing",
            "command-tent",
            vec![
                DialogueLine::new("Commander", "Listen up, {playerName}. The fort has fallen."),
                DialogueLine::new(
                    "Commander",
                    "Red team holds the bridge. We take it back at dawn.",
                ),
                DialogueLine::new(
                    "Scout",
                    "I counted twelve of them, maybe more behind the wall.",
                ),
            ],
        ),
        Scene::new(
            "The Bridge",
            "river-crossing",
            vec![
                DialogueLine::new("Scout", "Foam darts incoming! Get down!"),
                DialogueLine::new("Commander", "{playerName}, flank left and draw their fire."),
            ],
        ),
        Scene::new(
            "Debrief",
            "command-tent",
            vec![DialogueLine::new(
                "Commander",
                "Good work out there, {playerName}. The bridge is ours.",
            )],
        ),
    ])
}
